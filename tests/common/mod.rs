// SPDX-License-Identifier: Apache-2.0

//! In-memory collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use prestogres_core::error::DUPLICATE_SCHEMA_SQLSTATE;
use prestogres_core::{
    BridgeError, BridgeResult, CatalogResult, ColumnDescriptor, ConnectionInfo, LocalExecutor,
    PreparedStatement, RemoteCatalogReader, RemoteQuery, RemoteQueryEngine, Row, Value,
};
use prestogres_sql::catalog_queries::{LOCAL_BASE_TABLES_SQL, LOCAL_SCHEMAS_SQL, REMOTE_COLUMNS_SQL};

pub fn conn() -> ConnectionInfo {
    ConnectionInfo::new("coordinator:8080", "alice", "hive", "default")
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// `count` rows of `width` columns; column 0 holds the row number.
pub fn numbered_rows(count: usize, width: usize) -> Vec<Row> {
    (0..count)
        .map(|i| {
            let mut values = vec![Value::Int(i as i64)];
            for c in 1..width {
                values.push(Value::Text(format!("r{i}c{c}")));
            }
            Row::new(values)
        })
        .collect()
}

/// `width` columns: a bigint followed by varchars.
pub fn numbered_columns(width: usize) -> Vec<ColumnDescriptor> {
    (0..width)
        .map(|c| {
            if c == 0 {
                ColumnDescriptor::new("id", "bigint", true)
            } else {
                ColumnDescriptor::new(format!("c{c}"), "varchar", true)
            }
        })
        .collect()
}

// ==================== Remote query engine ====================

/// Remote engine serving one fixed result
pub struct FakeRemote {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
    pub fail_open: Option<String>,
    pub fail_at_row: Option<usize>,
    pub fail_close: bool,
    pub opened: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
    pub pulled: Arc<AtomicUsize>,
}

impl FakeRemote {
    pub fn new(columns: Vec<ColumnDescriptor>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            fail_open: None,
            fail_at_row: None,
            fail_close: false,
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_open(mut self, message: &str) -> Self {
        self.fail_open = Some(message.to_string());
        self
    }

    /// `next_row` fails instead of returning row `index`.
    pub fn failing_at_row(mut self, index: usize) -> Self {
        self.fail_at_row = Some(index);
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteQueryEngine for FakeRemote {
    fn engine_id(&self) -> &'static str {
        "fake"
    }

    async fn open(&self, _conn: &ConnectionInfo, _query: &str) -> BridgeResult<Box<dyn RemoteQuery>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_open {
            return Err(BridgeError::remote_query_named(message.clone(), "SYNTAX_ERROR"));
        }
        Ok(Box::new(FakeQuery {
            columns: self.columns.clone(),
            rows: self.rows.clone().into_iter(),
            position: 0,
            fail_at_row: self.fail_at_row,
            fail_close: self.fail_close,
            closed: Arc::clone(&self.closed),
            pulled: Arc::clone(&self.pulled),
        }))
    }
}

pub struct FakeQuery {
    columns: Vec<ColumnDescriptor>,
    rows: std::vec::IntoIter<Row>,
    position: usize,
    fail_at_row: Option<usize>,
    fail_close: bool,
    closed: Arc<AtomicUsize>,
    pulled: Arc<AtomicUsize>,
}

#[async_trait]
impl RemoteQuery for FakeQuery {
    async fn columns(&mut self) -> BridgeResult<Vec<ColumnDescriptor>> {
        Ok(self.columns.clone())
    }

    async fn next_row(&mut self) -> BridgeResult<Option<Row>> {
        if self.fail_at_row == Some(self.position) {
            return Err(BridgeError::remote_query("Query exceeded maximum time limit"));
        }
        let row = self.rows.next();
        if row.is_some() {
            self.position += 1;
            self.pulled.fetch_add(1, Ordering::SeqCst);
        }
        Ok(row)
    }

    async fn close(&mut self) -> BridgeResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(BridgeError::remote_query("Failed to cancel query: HTTP 500"));
        }
        Ok(())
    }
}

// ==================== Remote catalog ====================

pub fn catalog_row(schema: &str, table: &str, column: &str, nullable: &str, ty: &str) -> Row {
    Row::new(vec![text(schema), text(table), text(column), text(nullable), text(ty)])
}

pub fn catalog_result(rows: Vec<Row>) -> CatalogResult {
    CatalogResult {
        columns: ["table_schema", "table_name", "column_name", "is_nullable", "data_type"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        rows: Some(rows),
    }
}

pub struct FakeCatalog {
    result: Mutex<CatalogResult>,
    fail: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new(result: CatalogResult) -> Self {
        Self {
            result: Mutex::new(result),
            fail: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_result(&self, result: CatalogResult) {
        *self.result.lock() = result;
    }

    pub fn fail_with(&self, message: &str) {
        *self.fail.lock() = Some(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteCatalogReader for FakeCatalog {
    async fn run_query(&self, _conn: &ConnectionInfo, sql: &str) -> BridgeResult<CatalogResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(sql, REMOTE_COLUMNS_SQL);
        if let Some(message) = self.fail.lock().clone() {
            return Err(BridgeError::remote_query(message));
        }
        Ok(self.result.lock().clone())
    }
}

// ==================== Local database ====================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TempTable {
    /// `(name, type)` in declaration order
    pub columns: Vec<(String, String)>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbState {
    pub schemas: BTreeSet<String>,
    /// `(schema, table)` -> column definitions as written
    pub tables: BTreeMap<(String, String), Vec<String>>,
    pub temp_tables: BTreeMap<String, TempTable>,
}

#[derive(Debug, Clone)]
pub struct InsertCall {
    pub sql: String,
    pub table: String,
    pub rows: usize,
    pub params: usize,
}

#[derive(Default)]
struct Recorder {
    state: DbState,
    snapshots: Vec<DbState>,
    executed: Vec<String>,
    inserts: Vec<InsertCall>,
    queries: usize,
    begins: usize,
    commits: usize,
    rollbacks: usize,
    probe_readings: Vec<usize>,
}

/// Local executor holding schemas and tables in memory. Every statement is
/// parsed as PostgreSQL before it is applied.
pub struct MemoryDatabase {
    inner: Mutex<Recorder>,
    fail_on: Mutex<Option<String>>,
    strict_create_schema: bool,
    probe: Option<Arc<AtomicUsize>>,
}

impl MemoryDatabase {
    /// A database holding the schemas a fresh PostgreSQL server has, plus
    /// the bridge metadata schemas.
    pub fn new() -> Self {
        let mut state = DbState::default();
        for schema in [
            "information_schema",
            "pg_catalog",
            "pg_toast",
            "pgpool_catalog",
            "prestogres_catalog",
            "public",
        ] {
            state.schemas.insert(schema.to_string());
        }
        Self {
            inner: Mutex::new(Recorder {
                state,
                ..Recorder::default()
            }),
            fail_on: Mutex::new(None),
            strict_create_schema: false,
            probe: None,
        }
    }

    /// Every `create schema if not exists` fails with SQLSTATE 42P06 after
    /// the schema appears, as when a concurrent session wins the race.
    pub fn strict_create_schema(mut self) -> Self {
        self.strict_create_schema = true;
        self
    }

    /// Samples `counter` on every prepared execution.
    pub fn with_probe(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.probe = Some(counter);
        self
    }

    /// Statements containing `needle` fail from now on.
    pub fn fail_on(&self, needle: &str) {
        *self.fail_on.lock() = Some(needle.to_string());
    }

    pub fn clear_failure(&self) {
        *self.fail_on.lock() = None;
    }

    pub fn state(&self) -> DbState {
        self.inner.lock().state.clone()
    }

    pub fn add_schema(&self, schema: &str) {
        self.inner.lock().state.schemas.insert(schema.to_string());
    }

    pub fn add_table(&self, schema: &str, table: &str, columns: &[&str]) {
        let mut inner = self.inner.lock();
        inner.state.schemas.insert(schema.to_string());
        inner.state.tables.insert(
            (schema.to_string(), table.to_string()),
            columns.iter().map(|c| c.to_string()).collect(),
        );
    }

    pub fn executed(&self) -> Vec<String> {
        self.inner.lock().executed.clone()
    }

    pub fn inserts(&self) -> Vec<InsertCall> {
        self.inner.lock().inserts.clone()
    }

    pub fn statement_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.executed.len() + inner.inserts.len()
    }

    pub fn queries(&self) -> usize {
        self.inner.lock().queries
    }

    pub fn transactions(&self) -> (usize, usize, usize) {
        let inner = self.inner.lock();
        (inner.begins, inner.commits, inner.rollbacks)
    }

    pub fn probe_readings(&self) -> Vec<usize> {
        self.inner.lock().probe_readings.clone()
    }

    pub fn temp_table(&self, name: &str) -> Option<TempTable> {
        self.inner.lock().state.temp_tables.get(name).cloned()
    }

    pub fn table(&self, schema: &str, table: &str) -> Option<Vec<String>> {
        self.inner
            .lock()
            .state
            .tables
            .get(&(schema.to_string(), table.to_string()))
            .cloned()
    }

    fn check_failure(&self, sql: &str) -> BridgeResult<()> {
        match self.fail_on.lock().as_deref() {
            Some(needle) if sql.contains(needle) => Err(BridgeError::local_execution_with_state(
                format!("injected failure: {sql}"),
                Some("XX000".to_string()),
            )),
            _ => Ok(()),
        }
    }

    fn apply(&self, recorder: &mut Recorder, sql: &str) -> BridgeResult<u64> {
        let state = &mut recorder.state;

        if let Some(rest) = sql.strip_prefix("create temp table ") {
            let (name, rest) = take_ident(rest)?;
            let columns = column_lines(rest)
                .into_iter()
                .map(|line| -> BridgeResult<(String, String)> {
                    let (col, ty) = take_ident(&line)?;
                    Ok((col, ty.trim().to_string()))
                })
                .collect::<BridgeResult<Vec<_>>>()?;
            if state.temp_tables.contains_key(&name) {
                return Err(BridgeError::local_execution_with_state(
                    format!("relation \"{name}\" already exists"),
                    Some("42P07".to_string()),
                ));
            }
            state.temp_tables.insert(name, TempTable { columns, rows: Vec::new() });
        } else if let Some(rest) = sql.strip_prefix("create schema if not exists ") {
            let (schema, _) = take_ident(rest)?;
            state.schemas.insert(schema.clone());
            if self.strict_create_schema {
                // The winning session committed, so no rollback removes it
                for snapshot in recorder.snapshots.iter_mut() {
                    snapshot.schemas.insert(schema.clone());
                }
                return Err(BridgeError::local_execution_with_state(
                    format!("schema \"{schema}\" already exists"),
                    Some(DUPLICATE_SCHEMA_SQLSTATE.to_string()),
                ));
            }
        } else if let Some(rest) = sql.strip_prefix("drop schema ") {
            let (schema, _) = take_ident(rest)?;
            if !state.schemas.remove(&schema) {
                return Err(missing("schema", &schema));
            }
            state.tables.retain(|(s, _), _| s != &schema);
        } else if let Some(rest) = sql.strip_prefix("drop table if exists ") {
            let (schema, table) = take_qualified(rest)?;
            state.tables.remove(&(schema, table));
        } else if let Some(rest) = sql.strip_prefix("drop table ") {
            let (schema, table) = take_qualified(rest)?;
            if state.tables.remove(&(schema.clone(), table.clone())).is_none() {
                return Err(missing("table", &format!("{schema}.{table}")));
            }
        } else if let Some(rest) = sql.strip_prefix("create table ") {
            let (schema, table) = take_qualified(rest)?;
            if !state.schemas.contains(&schema) {
                return Err(missing("schema", &schema));
            }
            let key = (schema, table);
            if state.tables.contains_key(&key) {
                return Err(BridgeError::local_execution_with_state(
                    format!("relation \"{}\" already exists", key.1),
                    Some("42P07".to_string()),
                ));
            }
            state.tables.insert(key, column_lines(rest));
        } else {
            return Err(BridgeError::local_execution(format!("unexpected statement: {sql}")));
        }

        recorder.executed.push(sql.to_string());
        Ok(0)
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalExecutor for MemoryDatabase {
    async fn execute(&self, sql: &str) -> BridgeResult<u64> {
        assert_valid_postgres(sql);
        self.check_failure(sql)?;
        let mut inner = self.inner.lock();
        self.apply(&mut inner, sql)
    }

    async fn execute_prepared(&self, statement: &PreparedStatement, params: &[Value]) -> BridgeResult<u64> {
        assert_valid_postgres(&statement.sql);
        self.check_failure(&statement.sql)?;

        let placeholders = statement.sql.matches('$').count();
        assert_eq!(placeholders, params.len(), "placeholder count");
        assert_eq!(statement.param_types.len(), params.len(), "declared parameter types");

        let rest = statement
            .sql
            .strip_prefix("insert into ")
            .ok_or_else(|| BridgeError::local_execution(format!("unexpected statement: {}", statement.sql)))?;
        let (table, _) = take_ident(rest)?;

        let mut inner = self.inner.lock();
        if let Some(probe) = &self.probe {
            let reading = probe.load(Ordering::SeqCst);
            inner.probe_readings.push(reading);
        }

        let temp = inner
            .state
            .temp_tables
            .get_mut(&table)
            .ok_or_else(|| missing("relation", &table))?;
        let width = temp.columns.len();
        assert_eq!(params.len() % width, 0, "params are whole rows");
        for chunk in params.chunks(width) {
            temp.rows.push(chunk.to_vec());
        }

        let rows = params.len() / width;
        inner.inserts.push(InsertCall {
            sql: statement.sql.clone(),
            table,
            rows,
            params: params.len(),
        });
        Ok(rows as u64)
    }

    async fn query(&self, sql: &str) -> BridgeResult<Vec<Row>> {
        assert_valid_postgres(sql);
        let mut inner = self.inner.lock();
        inner.queries += 1;

        if sql == LOCAL_SCHEMAS_SQL {
            Ok(inner
                .state
                .schemas
                .iter()
                .map(|s| Row::new(vec![text(s)]))
                .collect())
        } else if sql == LOCAL_BASE_TABLES_SQL {
            Ok(inner
                .state
                .tables
                .keys()
                .map(|(s, t)| Row::new(vec![text(s), text(t)]))
                .collect())
        } else {
            Err(BridgeError::local_execution(format!("unexpected query: {sql}")))
        }
    }

    async fn begin(&self) -> BridgeResult<()> {
        let mut inner = self.inner.lock();
        let snapshot = inner.state.clone();
        inner.snapshots.push(snapshot);
        inner.begins += 1;
        Ok(())
    }

    async fn commit(&self) -> BridgeResult<()> {
        let mut inner = self.inner.lock();
        inner
            .snapshots
            .pop()
            .ok_or_else(|| BridgeError::validation("commit without an open transaction scope"))?;
        inner.commits += 1;
        Ok(())
    }

    async fn rollback(&self) -> BridgeResult<()> {
        let mut inner = self.inner.lock();
        let snapshot = inner
            .snapshots
            .pop()
            .ok_or_else(|| BridgeError::validation("rollback without an open transaction scope"))?;
        inner.state = snapshot;
        inner.rollbacks += 1;
        Ok(())
    }
}

pub fn assert_valid_postgres(sql: &str) {
    Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .unwrap_or_else(|e| panic!("statement does not parse as PostgreSQL: {e}\n{sql}"));
}

fn missing(kind: &str, name: &str) -> BridgeError {
    BridgeError::local_execution_with_state(format!("{kind} \"{name}\" does not exist"), Some("42P01".to_string()))
}

/// Reads one leading quoted identifier, returning it and the remainder.
fn take_ident(input: &str) -> BridgeResult<(String, &str)> {
    let input = input.trim_start();
    let mut chars = input.char_indices();
    if !matches!(chars.next(), Some((_, '"'))) {
        return Err(BridgeError::validation(format!("expected quoted identifier: {input}")));
    }

    let mut name = String::new();
    let mut pending_quote = false;
    for (idx, ch) in chars {
        if pending_quote {
            if ch == '"' {
                name.push('"');
                pending_quote = false;
                continue;
            }
            return Ok((name, &input[idx..]));
        }
        if ch == '"' {
            pending_quote = true;
        } else {
            name.push(ch);
        }
    }

    if pending_quote {
        Ok((name, ""))
    } else {
        Err(BridgeError::validation(format!("unterminated identifier: {input}")))
    }
}

fn take_qualified(input: &str) -> BridgeResult<(String, String)> {
    let (schema, rest) = take_ident(input)?;
    let rest = rest
        .strip_prefix('.')
        .ok_or_else(|| BridgeError::validation(format!("expected qualified name: {input}")))?;
    let (table, _) = take_ident(rest)?;
    Ok((schema, table))
}

/// Column definition lines between the outer parentheses.
fn column_lines(rest: &str) -> Vec<String> {
    let body = match rest.find("(\n") {
        Some(start) => &rest[start + 2..],
        None => rest,
    };
    let body = body.trim_end().trim_end_matches(')');
    body.lines()
        .map(|line| line.trim().trim_end_matches(',').to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
