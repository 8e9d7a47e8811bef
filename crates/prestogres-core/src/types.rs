// SPDX-License-Identifier: Apache-2.0

//! Data types shared by the materializer and the catalog synchronizer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::type_map::LocalType;

/// Remote engine connection descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Coordinator address, `host:port` or a full `http(s)://` URL
    pub server: String,
    pub user: String,
    pub catalog: String,
    pub schema: String,
}

impl ConnectionInfo {
    pub fn new(
        server: impl Into<String>,
        user: impl Into<String>,
        catalog: impl Into<String>,
        schema: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            user: user.into(),
            catalog: catalog.into(),
            schema: schema.into(),
        }
    }

    /// Identity under which catalog syncs are throttled.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            server: self.server.clone(),
            user: self.user.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

/// `(server, user, catalog)` identity of a synced catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub server: String,
    pub user: String,
    pub catalog: String,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.server, self.user, self.catalog)
    }
}

/// Column metadata as reported by the remote engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub remote_type: String,
    pub nullable: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, remote_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            remote_type: remote_type.into(),
            nullable,
        }
    }
}

/// Scalar value carried from the remote engine to a statement parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text rendering used when a non-text value lands in a text column.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Json(j) => Some(j.to_string()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Json(other),
        }
    }
}

/// A single row of data (indexed by column order)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Result of a catalog query on the remote engine.
///
/// `rows` is `None` when the engine returned no data section at all, which
/// is distinct from a data section with zero rows.
#[derive(Debug, Clone, Default)]
pub struct CatalogResult {
    pub columns: Vec<String>,
    pub rows: Option<Vec<Row>>,
}

/// Parameterized statement ready for execution on the local database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    pub sql: String,
    pub param_types: Vec<LocalType>,
}
