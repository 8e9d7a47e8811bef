// SPDX-License-Identifier: Apache-2.0

//! Presto client over the HTTP statement protocol.
//!
//! A query is submitted with `POST /v1/statement`; results arrive in pages
//! that are pulled by following `nextUri` until the coordinator stops
//! returning one. `DELETE nextUri` cancels a query that is still running.
//! Pages are fetched only when the buffered rows run out, so a handle never
//! holds more than one page in memory.

use std::collections::VecDeque;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use prestogres_core::{
    BridgeError, BridgeResult, CatalogResult, ColumnDescriptor, ConnectionInfo, RemoteCatalogReader,
    RemoteQuery, RemoteQueryEngine, Row, Value,
};

const STATEMENT_PATH: &str = "/v1/statement";
const DEFAULT_SOURCE: &str = "prestogres";

const HEADER_USER: &str = "X-Presto-User";
const HEADER_CATALOG: &str = "X-Presto-Catalog";
const HEADER_SCHEMA: &str = "X-Presto-Schema";
const HEADER_SOURCE: &str = "X-Presto-Source";

/// One page of the statement protocol
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResults {
    #[serde(default)]
    id: String,
    next_uri: Option<String>,
    columns: Option<Vec<PrestoColumn>>,
    data: Option<Vec<Vec<serde_json::Value>>>,
    error: Option<QueryError>,
    stats: Option<StatementStats>,
}

#[derive(Debug, Deserialize)]
struct PrestoColumn {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryError {
    message: String,
    error_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementStats {
    state: String,
}

impl QueryError {
    fn into_bridge_error(self) -> BridgeError {
        match self.error_name {
            Some(name) => BridgeError::remote_query_named(self.message, name),
            None => BridgeError::remote_query(self.message),
        }
    }
}

/// Presto coordinator client
pub struct PrestoClient {
    http: Client,
    source: String,
}

impl PrestoClient {
    pub fn new() -> Self {
        Self::with_source(DEFAULT_SOURCE)
    }

    /// Client reporting `source` in `X-Presto-Source`
    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            source: source.into(),
        }
    }

    /// Statement endpoint for `server` (`host:port` or an http(s) URL).
    pub fn statement_url(server: &str) -> BridgeResult<Url> {
        let base = if server.starts_with("http://") || server.starts_with("https://") {
            server.to_string()
        } else {
            format!("http://{server}")
        };

        Url::parse(&base)
            .and_then(|url| url.join(STATEMENT_PATH))
            .map_err(|e| BridgeError::remote_query(format!("Invalid Presto server address '{server}': {e}")))
    }

    async fn submit(&self, conn: &ConnectionInfo, sql: &str) -> BridgeResult<PrestoQuery> {
        let url = Self::statement_url(&conn.server)?;
        debug!(url = %url, user = %conn.user, catalog = %conn.catalog, "submitting Presto query");

        let response = self
            .http
            .post(url)
            .header(HEADER_USER, &conn.user)
            .header(HEADER_CATALOG, &conn.catalog)
            .header(HEADER_SCHEMA, &conn.schema)
            .header(HEADER_SOURCE, &self.source)
            .body(sql.to_string())
            .send()
            .await
            .map_err(request_error)?;

        let mut query = PrestoQuery::new(self.http.clone(), conn.user.clone());
        query.absorb(read_results(response).await?)?;
        Ok(query)
    }
}

impl Default for PrestoClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteQueryEngine for PrestoClient {
    fn engine_id(&self) -> &'static str {
        "presto"
    }

    async fn open(&self, conn: &ConnectionInfo, query: &str) -> BridgeResult<Box<dyn RemoteQuery>> {
        let query = self.submit(conn, query).await?;
        Ok(Box::new(query))
    }
}

#[async_trait]
impl RemoteCatalogReader for PrestoClient {
    async fn run_query(&self, conn: &ConnectionInfo, sql: &str) -> BridgeResult<CatalogResult> {
        let mut query = self.submit(conn, sql).await?;
        let result = query.collect_all().await;
        let closed = query.close().await;
        let result = result?;
        closed?;
        Ok(result)
    }
}

/// Handle over one running Presto query
pub struct PrestoQuery {
    http: Client,
    user: String,
    query_id: Option<String>,
    next_uri: Option<String>,
    columns: Option<Vec<ColumnDescriptor>>,
    buffered: VecDeque<Row>,
    saw_data: bool,
}

impl PrestoQuery {
    fn new(http: Client, user: String) -> Self {
        Self {
            http,
            user,
            query_id: None,
            next_uri: None,
            columns: None,
            buffered: VecDeque::new(),
            saw_data: false,
        }
    }

    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }

    /// Folds one page into the handle state.
    fn absorb(&mut self, results: QueryResults) -> BridgeResult<()> {
        if self.query_id.is_none() && !results.id.is_empty() {
            self.query_id = Some(results.id);
        }

        if let Some(error) = results.error {
            // A failed query has nothing left to cancel
            self.next_uri = None;
            return Err(error.into_bridge_error());
        }

        if let Some(stats) = &results.stats {
            debug!(query_id = ?self.query_id, state = %stats.state, "Presto page");
        }

        if self.columns.is_none() {
            if let Some(columns) = results.columns {
                // The protocol carries no nullability
                self.columns = Some(
                    columns
                        .into_iter()
                        .map(|c| ColumnDescriptor::new(c.name, c.type_name, true))
                        .collect(),
                );
            }
        }

        if let Some(data) = results.data {
            self.saw_data = true;
            self.buffered.extend(
                data.into_iter()
                    .map(|row| Row::new(row.into_iter().map(Value::from).collect())),
            );
        }

        self.next_uri = results.next_uri;
        Ok(())
    }

    /// Fetches the next page; `false` once the query is finished.
    async fn advance(&mut self) -> BridgeResult<bool> {
        let Some(uri) = self.next_uri.clone() else {
            return Ok(false);
        };

        let response = self
            .http
            .get(&uri)
            .header(HEADER_USER, &self.user)
            .send()
            .await
            .map_err(request_error)?;

        self.absorb(read_results(response).await?)?;
        Ok(true)
    }

    async fn collect_all(&mut self) -> BridgeResult<CatalogResult> {
        let columns = self.columns().await?.into_iter().map(|c| c.name).collect();

        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }

        Ok(CatalogResult {
            columns,
            rows: self.saw_data.then_some(rows),
        })
    }
}

#[async_trait]
impl RemoteQuery for PrestoQuery {
    async fn columns(&mut self) -> BridgeResult<Vec<ColumnDescriptor>> {
        loop {
            if let Some(columns) = &self.columns {
                return Ok(columns.clone());
            }
            if !self.advance().await? {
                return Ok(Vec::new());
            }
        }
    }

    async fn next_row(&mut self) -> BridgeResult<Option<Row>> {
        loop {
            if let Some(row) = self.buffered.pop_front() {
                return Ok(Some(row));
            }
            if !self.advance().await? {
                return Ok(None);
            }
        }
    }

    async fn close(&mut self) -> BridgeResult<()> {
        self.buffered.clear();
        let Some(uri) = self.next_uri.take() else {
            return Ok(());
        };

        debug!(query_id = ?self.query_id, "cancelling unfinished Presto query");
        let response = self
            .http
            .delete(&uri)
            .header(HEADER_USER, &self.user)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            Ok(())
        } else {
            warn!(query_id = ?self.query_id, %status, "Presto refused query cancellation");
            Err(BridgeError::remote_query(format!(
                "Failed to cancel Presto query: HTTP {status}"
            )))
        }
    }
}

async fn read_results(response: Response) -> BridgeResult<QueryResults> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BridgeError::remote_query(format!("HTTP {status}: {body}")));
    }

    response
        .json::<QueryResults>()
        .await
        .map_err(|e| BridgeError::remote_query(format!("Invalid Presto response: {e}")))
}

fn request_error(err: reqwest::Error) -> BridgeError {
    BridgeError::remote_query(format!("Presto request failed: {err}"))
}
