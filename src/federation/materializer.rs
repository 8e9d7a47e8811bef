// SPDX-License-Identifier: Apache-2.0

//! Remote result materialization.
//!
//! Runs a query on the remote engine and copies its result into a local
//! temporary table: the table is created from the result's column metadata,
//! then rows are streamed off the remote handle and inserted in small
//! multi-row batches. Memory use is bounded by one batch regardless of the
//! result size.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use prestogres_core::{
    map_type, BridgeError, BridgeResult, ConnectionInfo, LocalExecutor, RemoteQuery,
    RemoteQueryEngine, Row, TypeContext, Value,
};
use prestogres_sql::{create_temp_table, InsertTemplate, MAX_BIND_PARAMETERS};

use crate::config::DEFAULT_BATCH_THRESHOLD;
use crate::metrics;

/// What one materialization loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaterializeSummary {
    pub columns: usize,
    pub rows: u64,
    /// INSERT statements executed
    pub batches: u64,
}

pub struct ResultMaterializer {
    remote: Arc<dyn RemoteQueryEngine>,
    local: Arc<dyn LocalExecutor>,
    batch_threshold: usize,
}

impl ResultMaterializer {
    pub fn new(remote: Arc<dyn RemoteQueryEngine>, local: Arc<dyn LocalExecutor>) -> Self {
        Self {
            remote,
            local,
            batch_threshold: DEFAULT_BATCH_THRESHOLD,
        }
    }

    /// A batch is flushed once it holds more than `threshold` rows.
    pub fn with_batch_threshold(mut self, threshold: usize) -> Self {
        self.batch_threshold = threshold.max(1);
        self
    }

    pub fn batch_threshold(&self) -> usize {
        self.batch_threshold
    }

    /// Runs `query` remotely and loads its full result into the temporary
    /// table `table_name`.
    ///
    /// The remote handle is closed on every path. On failure the table may
    /// exist partially populated; no cleanup is attempted.
    #[instrument(
        skip(self, conn, query),
        fields(engine = self.remote.engine_id(), table = %table_name, query_len = query.len())
    )]
    pub async fn materialize(
        &self,
        conn: &ConnectionInfo,
        table_name: &str,
        query: &str,
    ) -> BridgeResult<MaterializeSummary> {
        let start = Instant::now();

        match self.run(conn, table_name, query).await {
            Ok(summary) => {
                metrics::record_materialization(summary.rows, summary.batches);
                info!(
                    rows = summary.rows,
                    batches = summary.batches,
                    elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "materialized remote result"
                );
                Ok(summary)
            }
            Err(e) => {
                metrics::record_materialization_failure();
                error!(kind = %e.kind(), error = %e, "materialization failed");
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        conn: &ConnectionInfo,
        table_name: &str,
        query: &str,
    ) -> BridgeResult<MaterializeSummary> {
        let mut handle = self.remote.open(conn, query).await?;
        let loaded = self.load(handle.as_mut(), table_name).await;
        let closed = handle.close().await;

        match (loaded, closed) {
            (Ok(summary), Ok(())) => Ok(summary),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(error = %close_err, "failed to close remote query after load failure");
                Err(e)
            }
        }
    }

    async fn load(
        &self,
        handle: &mut dyn RemoteQuery,
        table_name: &str,
    ) -> BridgeResult<MaterializeSummary> {
        let columns = handle.columns().await?;
        if columns.is_empty() {
            return Err(BridgeError::validation(format!(
                "Cannot create temp table '{table_name}': no columns"
            )));
        }

        // Every type is resolved before the table exists
        let types = columns
            .iter()
            .map(|c| map_type(&c.remote_type, TypeContext::ResultSet))
            .collect::<BridgeResult<Vec<_>>>()?;

        let (create_sql, template) = {
            let quote = |name: &str| self.local.quote_identifier(name);
            (
                create_temp_table(&quote, table_name, &columns, &types),
                InsertTemplate::new(&quote, table_name, &columns, types),
            )
        };

        let width = columns.len();
        let full_batch = self.batch_threshold + 1;
        if full_batch > template.max_rows_per_statement() {
            return Err(BridgeError::validation(format!(
                "{width} columns in batches of {full_batch} rows exceed {MAX_BIND_PARAMETERS} bind parameters"
            )));
        }

        self.local.execute(&create_sql).await?;
        debug!(columns = width, "created temp table");

        let mut summary = MaterializeSummary {
            columns: width,
            ..MaterializeSummary::default()
        };
        let mut batch: Vec<Row> = Vec::with_capacity(full_batch);

        while let Some(row) = handle.next_row().await? {
            if row.len() != width {
                return Err(BridgeError::validation(format!(
                    "remote row has {} values but the result has {width} columns",
                    row.len()
                )));
            }
            batch.push(row);

            if batch.len() > self.batch_threshold {
                summary.rows += self.flush(&template, &mut batch).await?;
                summary.batches += 1;
            }
        }

        if !batch.is_empty() {
            summary.rows += self.flush(&template, &mut batch).await?;
            summary.batches += 1;
        }

        Ok(summary)
    }

    /// Inserts and clears `batch`, returning the number of rows written.
    async fn flush(&self, template: &InsertTemplate, batch: &mut Vec<Row>) -> BridgeResult<u64> {
        let rows = batch.len();
        let statement = self
            .local
            .prepare(&template.render(rows), template.param_types(rows))
            .await?;

        let params: Vec<Value> = batch.drain(..).flat_map(|row| row.values).collect();
        self.local.execute_prepared(&statement, &params).await?;
        debug!(rows, "flushed batch");
        Ok(rows as u64)
    }
}
