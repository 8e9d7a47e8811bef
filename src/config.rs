// SPDX-License-Identifier: Apache-2.0

//! Bridge configuration
//!
//! Loaded from an optional JSON file, then overridden by `PRESTOGRES_*`
//! environment variables. Every field has a default, so a missing file is
//! not an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use prestogres_core::{BridgeError, BridgeResult};

/// Rows buffered before a flush is triggered; a full batch holds one more.
pub const DEFAULT_BATCH_THRESHOLD: usize = 10;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 10;
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;
pub const DEFAULT_PRESTO_SOURCE: &str = "prestogres";

/// Upper bound accepted for the cache TTL (one day).
const MAX_CACHE_TTL_SECS: u64 = 86_400;

/// Local schemas starting with these prefixes belong to the server itself.
const INTERNAL_SCHEMA_PREFIXES: [&str; 2] = ["pg_toast", "pg_temp_"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    pub batch_threshold: usize,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    /// Value sent as `X-Presto-Source`
    pub presto_source: String,
    pub namespaces: NamespacePolicy,
    pub logging: LoggingConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            presto_source: DEFAULT_PRESTO_SOURCE.to_string(),
            namespaces: NamespacePolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Which local schemas the catalog sync may touch, and which remote schemas
/// it mirrors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NamespacePolicy {
    /// The bridge's own metadata schemas: kept, but emptied of base tables
    pub bridge_schemas: Vec<String>,
    /// Never dropped nor written to
    pub system_schemas: Vec<String>,
    /// Remote schemas that are not mirrored
    pub skipped_source_schemas: Vec<String>,
}

impl Default for NamespacePolicy {
    fn default() -> Self {
        Self {
            bridge_schemas: vec!["pgpool_catalog".into(), "prestogres_catalog".into()],
            system_schemas: vec![
                "pg_catalog".into(),
                "information_schema".into(),
                "public".into(),
            ],
            skipped_source_schemas: vec!["sys".into(), "information_schema".into()],
        }
    }
}

impl NamespacePolicy {
    pub fn is_bridge_schema(&self, name: &str) -> bool {
        self.bridge_schemas.iter().any(|s| s == name)
    }

    /// True for local schemas a sync must neither drop nor alter.
    pub fn is_protected(&self, name: &str) -> bool {
        self.is_bridge_schema(name)
            || self.system_schemas.iter().any(|s| s == name)
            || INTERNAL_SCHEMA_PREFIXES.iter().any(|p| name.starts_with(p))
    }

    pub fn is_skipped_source(&self, name: &str) -> bool {
        self.skipped_source_schemas.iter().any(|s| s == name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` wins when set
    pub filter: Option<String>,
    /// Daily-rotated JSON logs go here; stderr when unset
    pub directory: Option<PathBuf>,
}

impl BridgeConfig {
    /// Reads `path` (if present), applies environment overrides, validates.
    pub fn load(path: &Path) -> BridgeResult<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| {
                BridgeError::validation(format!("Failed to read config {}: {e}", path.display()))
            })?;
            let config: BridgeConfig = serde_json::from_str(&content).map_err(|e| {
                BridgeError::validation(format!("Failed to parse config {}: {e}", path.display()))
            })?;
            debug!("Loaded bridge configuration from {:?}", path);
            config
        } else {
            debug!("No bridge config file at {:?}, using defaults", path);
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `PRESTOGRES_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> BridgeResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PRESTOGRES_BATCH_THRESHOLD") {
            self.batch_threshold = parse_env("PRESTOGRES_BATCH_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("PRESTOGRES_CACHE_TTL_SECS") {
            self.cache_ttl_secs = parse_env("PRESTOGRES_CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("PRESTOGRES_CACHE_CAPACITY") {
            self.cache_capacity = parse_env("PRESTOGRES_CACHE_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("PRESTOGRES_PRESTO_SOURCE") {
            self.presto_source = v;
        }
        if let Some(v) = lookup("PRESTOGRES_LOG") {
            self.logging.filter = Some(v);
        }
        if let Some(v) = lookup("PRESTOGRES_LOG_DIR") {
            self.logging.directory = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.batch_threshold == 0 {
            return Err(BridgeError::validation("batch_threshold must be at least 1"));
        }
        if self.cache_capacity == 0 {
            return Err(BridgeError::validation("cache_capacity must be at least 1"));
        }
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(BridgeError::validation(format!(
                "cache_ttl_secs must not exceed {MAX_CACHE_TTL_SECS}"
            )));
        }
        if self.presto_source.trim().is_empty() {
            return Err(BridgeError::validation("presto_source must not be empty"));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs as i64)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> BridgeResult<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| BridgeError::validation(format!("Invalid value for {key}: '{raw}'")))
}
