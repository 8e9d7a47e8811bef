// SPDX-License-Identifier: Apache-2.0

//! Collaborator traits
//!
//! The bridge never talks to a wire protocol directly. The remote engine and
//! the local database are reached through these traits, implemented by the
//! drivers crate and by in-memory fakes in tests.

use async_trait::async_trait;

use crate::error::BridgeResult;
use crate::quote::quote_ident;
use crate::type_map::LocalType;
use crate::types::{CatalogResult, ColumnDescriptor, ConnectionInfo, PreparedStatement, Row, Value};

/// Opens queries on the remote engine
#[async_trait]
pub trait RemoteQueryEngine: Send + Sync {
    /// Returns the unique identifier of the engine client (e.g. "presto")
    fn engine_id(&self) -> &'static str;

    /// Submits `query` and returns a handle over its result set.
    ///
    /// Fails with `RemoteQuery` when the engine rejects the query.
    async fn open(&self, conn: &ConnectionInfo, query: &str) -> BridgeResult<Box<dyn RemoteQuery>>;
}

/// A running remote query, exclusively owned by its caller
#[async_trait]
pub trait RemoteQuery: Send {
    /// Result column metadata, in result order
    async fn columns(&mut self) -> BridgeResult<Vec<ColumnDescriptor>>;

    /// Next result row, or `None` once the result is exhausted.
    ///
    /// Rows are pulled lazily; the result is never required to fit in memory
    /// and cannot be restarted.
    async fn next_row(&mut self) -> BridgeResult<Option<Row>>;

    /// Releases the query on the remote side. Safe to call more than once.
    async fn close(&mut self) -> BridgeResult<()>;
}

/// Runs metadata queries on the remote engine
#[async_trait]
pub trait RemoteCatalogReader: Send + Sync {
    async fn run_query(&self, conn: &ConnectionInfo, sql: &str) -> BridgeResult<CatalogResult>;
}

/// Statement execution on the local database
#[async_trait]
pub trait LocalExecutor: Send + Sync {
    /// Quotes an identifier for safe interpolation into SQL text
    fn quote_identifier(&self, name: &str) -> String {
        quote_ident(name)
    }

    /// Executes a statement without parameters, returning affected rows
    async fn execute(&self, sql: &str) -> BridgeResult<u64>;

    /// Prepares a parameterized statement with explicit parameter types
    async fn prepare(&self, sql: &str, param_types: Vec<LocalType>) -> BridgeResult<PreparedStatement> {
        Ok(PreparedStatement {
            sql: sql.to_string(),
            param_types,
        })
    }

    /// Executes a prepared statement with one value per declared parameter
    async fn execute_prepared(&self, statement: &PreparedStatement, params: &[Value]) -> BridgeResult<u64>;

    /// Runs a query and returns its rows
    async fn query(&self, sql: &str) -> BridgeResult<Vec<Row>>;

    /// Opens a transaction scope; nested scopes become savepoints
    async fn begin(&self) -> BridgeResult<()>;

    /// Commits the innermost transaction scope
    async fn commit(&self) -> BridgeResult<()>;

    /// Rolls back the innermost transaction scope
    async fn rollback(&self) -> BridgeResult<()>;
}
