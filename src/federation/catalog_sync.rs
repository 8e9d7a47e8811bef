// SPDX-License-Identifier: Apache-2.0

//! Catalog mirroring.
//!
//! Rebuilds local schemas and empty tables that mirror the remote engine's
//! `information_schema.columns`, so clients introspecting the local database
//! see the remote catalog. Rebuilds for the same `(server, user, catalog)`
//! are throttled by an [`ExpiryCache`].
//!
//! ## Pipeline
//!
//! 1. Cache check
//! 2. Remote column scan, grouped into a [`SchemaMap`]
//! 3. DDL planning (all types mapped before anything is dropped)
//! 4. Reset and recreate inside one transaction scope
//! 5. Cache stamp after commit

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use prestogres_core::{
    map_type, BridgeError, BridgeResult, CatalogResult, ColumnDescriptor, ConnectionInfo,
    LocalExecutor, RemoteCatalogReader, Row, TypeContext, Value,
};
use prestogres_sql::catalog_queries::{LOCAL_BASE_TABLES_SQL, LOCAL_SCHEMAS_SQL, REMOTE_COLUMNS_SQL};
use prestogres_sql::{
    create_mirror_table, create_schema_if_not_exists, drop_schema_cascade, drop_table,
    drop_table_if_exists,
};

use super::expiry_cache::ExpiryCache;
use crate::config::NamespacePolicy;
use crate::metrics;

/// schema -> table -> columns in remote order
pub type SchemaMap = BTreeMap<String, BTreeMap<String, Vec<ColumnDescriptor>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Synced recently; nothing was done
    Cached,
    /// The remote catalog returned nothing; local state untouched
    Empty,
    Rebuilt { schemas: usize, tables: usize },
}

/// DDL for one mirrored schema, rendered before the reset starts.
struct SchemaPlan {
    name: String,
    create: String,
    /// `(drop if exists, create)` per table
    tables: Vec<(String, String)>,
}

pub struct CatalogSynchronizer {
    reader: Arc<dyn RemoteCatalogReader>,
    local: Arc<dyn LocalExecutor>,
    cache: Arc<ExpiryCache>,
    namespaces: NamespacePolicy,
}

impl CatalogSynchronizer {
    pub fn new(
        reader: Arc<dyn RemoteCatalogReader>,
        local: Arc<dyn LocalExecutor>,
        cache: Arc<ExpiryCache>,
        namespaces: NamespacePolicy,
    ) -> Self {
        Self {
            reader,
            local,
            cache,
            namespaces,
        }
    }

    pub fn cache(&self) -> &Arc<ExpiryCache> {
        &self.cache
    }

    /// Mirrors the remote catalog of `conn` into the local database unless
    /// it was rebuilt less than one TTL ago.
    #[instrument(skip(self, conn), fields(key = %conn.cache_key()))]
    pub async fn sync(&self, conn: &ConnectionInfo) -> BridgeResult<SyncOutcome> {
        let key = conn.cache_key();
        if self.cache.is_fresh(&key) {
            debug!("catalog synced recently, skipping");
            metrics::record_sync_cached();
            return Ok(SyncOutcome::Cached);
        }

        let start = Instant::now();
        match self.rebuild(conn).await {
            Ok(SyncOutcome::Rebuilt { schemas, tables }) => {
                self.cache.record(key);
                metrics::record_sync_rebuilt();
                info!(
                    schemas,
                    tables,
                    elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "rebuilt catalog mirror"
                );
                Ok(SyncOutcome::Rebuilt { schemas, tables })
            }
            Ok(outcome) => {
                metrics::record_sync_empty();
                info!("remote catalog is empty, local mirror left as is");
                Ok(outcome)
            }
            Err(e) => {
                metrics::record_sync_failure();
                error!(kind = %e.kind(), error = %e, "catalog sync failed");
                Err(e)
            }
        }
    }

    async fn rebuild(&self, conn: &ConnectionInfo) -> BridgeResult<SyncOutcome> {
        let result = self.reader.run_query(conn, REMOTE_COLUMNS_SQL).await?;
        let schema_map = match group_columns(&result)? {
            Some(map) => map,
            None => return Ok(SyncOutcome::Empty),
        };

        let plans = self.plan(&schema_map)?;
        let tables = plans.iter().map(|p| p.tables.len()).sum();
        let schemas = plans.len();

        self.local.begin().await?;
        match self.apply(&plans).await {
            Ok(()) => {
                self.local.commit().await?;
                Ok(SyncOutcome::Rebuilt { schemas, tables })
            }
            Err(e) => {
                if let Err(rollback_err) = self.local.rollback().await {
                    warn!(error = %rollback_err, "failed to roll back catalog rebuild");
                }
                Err(e)
            }
        }
    }

    /// Renders every statement of the rebuild. Fails before any local
    /// mutation when a remote type has no local counterpart.
    fn plan(&self, schema_map: &SchemaMap) -> BridgeResult<Vec<SchemaPlan>> {
        let quote = |name: &str| self.local.quote_identifier(name);
        let mut plans = Vec::with_capacity(schema_map.len());

        for (schema, tables) in schema_map {
            if self.namespaces.is_skipped_source(schema) {
                continue;
            }
            if self.namespaces.is_protected(schema) {
                warn!(schema = %schema, "remote schema collides with a protected local schema, not mirrored");
                continue;
            }

            let mut table_sql = Vec::with_capacity(tables.len());
            for (table, columns) in tables {
                let typed = columns
                    .iter()
                    .map(|c| {
                        map_type(&c.remote_type, TypeContext::CatalogMirror).map(|ty| (c.clone(), ty))
                    })
                    .collect::<BridgeResult<Vec<_>>>()?;
                table_sql.push((
                    drop_table_if_exists(&quote, schema, table),
                    create_mirror_table(&quote, schema, table, &typed),
                ));
            }

            plans.push(SchemaPlan {
                name: schema.clone(),
                create: create_schema_if_not_exists(&quote, schema),
                tables: table_sql,
            });
        }

        Ok(plans)
    }

    async fn apply(&self, plans: &[SchemaPlan]) -> BridgeResult<()> {
        self.reset().await?;

        for plan in plans {
            self.create_schema(plan).await?;
            for (drop, create) in &plan.tables {
                self.local.execute(drop).await?;
                self.local.execute(create).await?;
            }
        }

        Ok(())
    }

    /// A failed statement aborts the enclosing transaction, so the tolerated
    /// duplicate-schema error is confined to a savepoint of its own.
    async fn create_schema(&self, plan: &SchemaPlan) -> BridgeResult<()> {
        self.local.begin().await?;
        match self.local.execute(&plan.create).await {
            Ok(_) => self.local.commit().await,
            Err(e) if e.is_duplicate_schema() => {
                debug!(schema = %plan.name, "schema already exists");
                self.local.rollback().await
            }
            Err(e) => {
                if let Err(rollback_err) = self.local.rollback().await {
                    warn!(error = %rollback_err, "failed to roll back schema creation");
                }
                Err(e)
            }
        }
    }

    /// Drops unprotected schemas and the base tables of the bridge schemas.
    async fn reset(&self) -> BridgeResult<()> {
        let mut drops = Vec::new();
        {
            let quote = |name: &str| self.local.quote_identifier(name);

            for row in self.local.query(LOCAL_SCHEMAS_SQL).await? {
                let schema = text_at(&row, 0, "schema_name")?;
                if !self.namespaces.is_protected(schema) {
                    drops.push(drop_schema_cascade(&quote, schema));
                }
            }
        }
        for sql in &drops {
            self.local.execute(sql).await?;
        }

        let mut drops = Vec::new();
        {
            let quote = |name: &str| self.local.quote_identifier(name);

            for row in self.local.query(LOCAL_BASE_TABLES_SQL).await? {
                let schema = text_at(&row, 0, "schema_name")?;
                if self.namespaces.is_bridge_schema(schema) {
                    let table = text_at(&row, 1, "table_name")?;
                    drops.push(drop_table(&quote, schema, table));
                }
            }
        }
        for sql in &drops {
            self.local.execute(sql).await?;
        }

        Ok(())
    }
}

/// Groups catalog rows by schema and table. `None` when the result carries
/// no rows at all.
pub fn group_columns(result: &CatalogResult) -> BridgeResult<Option<SchemaMap>> {
    let rows = match &result.rows {
        Some(rows) if !rows.is_empty() => rows,
        _ => return Ok(None),
    };

    let schema_idx = column_index(&result.columns, "table_schema", 0);
    let table_idx = column_index(&result.columns, "table_name", 1);
    let column_idx = column_index(&result.columns, "column_name", 2);
    let nullable_idx = column_index(&result.columns, "is_nullable", 3);
    let type_idx = column_index(&result.columns, "data_type", 4);

    let mut map = SchemaMap::new();
    for row in rows {
        let schema = text_at(row, schema_idx, "table_schema")?;
        let table = text_at(row, table_idx, "table_name")?;
        let column = ColumnDescriptor::new(
            text_at(row, column_idx, "column_name")?,
            text_at(row, type_idx, "data_type")?,
            parse_nullable(row.values.get(nullable_idx).unwrap_or(&Value::Null))?,
        );

        map.entry(schema.to_string())
            .or_default()
            .entry(table.to_string())
            .or_default()
            .push(column);
    }

    Ok(Some(map))
}

/// Reads an `is_nullable` cell: `YES`/`NO` in any case, or a boolean.
/// A missing value is taken as nullable.
pub fn parse_nullable(value: &Value) -> BridgeResult<bool> {
    match value {
        Value::Null => Ok(true),
        Value::Bool(b) => Ok(*b),
        Value::Text(s) if s.trim().eq_ignore_ascii_case("yes") => Ok(true),
        Value::Text(s) if s.trim().eq_ignore_ascii_case("no") => Ok(false),
        other => Err(BridgeError::validation(format!(
            "unrecognized is_nullable value: {other:?}"
        ))),
    }
}

fn column_index(columns: &[String], name: &str, fallback: usize) -> usize {
    columns
        .iter()
        .position(|c| c.eq_ignore_ascii_case(name))
        .unwrap_or(fallback)
}

fn text_at<'a>(row: &'a Row, idx: usize, name: &str) -> BridgeResult<&'a str> {
    row.values
        .get(idx)
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::validation(format!("catalog row has no text value for {name}")))
}
