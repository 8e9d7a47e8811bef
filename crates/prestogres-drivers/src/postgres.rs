// SPDX-License-Identifier: Apache-2.0

//! PostgreSQL executor
//!
//! Implements `LocalExecutor` over a single SQLx connection.
//!
//! ## Transaction Handling
//!
//! `begin()` issues `BEGIN` on the outermost scope and a savepoint on nested
//! ones, so the catalog synchronizer can own an atomic scope even when the
//! caller already opened one through the same executor.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnection, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::{Column, Connection, Row as SqlxRow};
use tokio::sync::Mutex;
use tracing::debug;

use prestogres_core::{
    BridgeError, BridgeResult, LocalExecutor, LocalType, PreparedStatement, Row, Value,
};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

struct ConnectionState {
    conn: PgConnection,
    /// Open transaction scopes (0 = autocommit)
    depth: usize,
}

/// Local executor backed by one PostgreSQL connection
pub struct PostgresExecutor {
    state: Mutex<ConnectionState>,
}

impl PostgresExecutor {
    pub async fn connect(url: &str) -> BridgeResult<Self> {
        let conn = PgConnection::connect(url)
            .await
            .map_err(|e| BridgeError::local_execution(format!("Failed to connect to PostgreSQL: {e}")))?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: PgConnection) -> Self {
        Self {
            state: Mutex::new(ConnectionState { conn, depth: 0 }),
        }
    }

    pub async fn close(self) -> BridgeResult<()> {
        self.state.into_inner().conn.close().await.map_err(local_error)
    }

    fn savepoint_name(level: usize) -> String {
        format!("prestogres_sp_{level}")
    }

    /// Converts a SQLx row to our universal Row type
    fn convert_row(pg_row: &PgRow) -> Row {
        let values = pg_row
            .columns()
            .iter()
            .map(|col| Self::extract_value(pg_row, col.ordinal()))
            .collect();
        Row::new(values)
    }

    /// Extracts a value from a PgRow at the given index
    fn extract_value(row: &PgRow, idx: usize) -> Value {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return v.map(Value::Int).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return v.map(|i| Value::Int(i as i64)).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
            return v.map(Value::Bool).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return v.map(Value::Float).unwrap_or(Value::Null);
        }
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return v.map(Value::Text).unwrap_or(Value::Null);
        }
        Value::Null
    }
}

#[async_trait]
impl LocalExecutor for PostgresExecutor {
    async fn execute(&self, sql: &str) -> BridgeResult<u64> {
        let mut state = self.state.lock().await;
        let result = sqlx::query(sql)
            .persistent(false)
            .execute(&mut state.conn)
            .await
            .map_err(local_error)?;
        Ok(result.rows_affected())
    }

    async fn execute_prepared(&self, statement: &PreparedStatement, params: &[Value]) -> BridgeResult<u64> {
        if params.len() != statement.param_types.len() {
            return Err(BridgeError::validation(format!(
                "statement declares {} parameters but {} values were supplied",
                statement.param_types.len(),
                params.len()
            )));
        }

        let mut query = sqlx::query(&statement.sql);
        for (value, ty) in params.iter().zip(statement.param_types.iter()) {
            query = bind_typed(query, *ty, value)?;
        }

        let mut state = self.state.lock().await;
        let result = query.execute(&mut state.conn).await.map_err(local_error)?;
        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str) -> BridgeResult<Vec<Row>> {
        let mut state = self.state.lock().await;
        let rows = sqlx::query(sql)
            .persistent(false)
            .fetch_all(&mut state.conn)
            .await
            .map_err(local_error)?;
        Ok(rows.iter().map(Self::convert_row).collect())
    }

    async fn begin(&self) -> BridgeResult<()> {
        let mut state = self.state.lock().await;
        let sql = if state.depth == 0 {
            "begin".to_string()
        } else {
            format!("savepoint {}", Self::savepoint_name(state.depth))
        };
        debug!(depth = state.depth, "opening transaction scope");
        sqlx::query(&sql)
            .persistent(false)
            .execute(&mut state.conn)
            .await
            .map_err(local_error)?;
        state.depth += 1;
        Ok(())
    }

    async fn commit(&self) -> BridgeResult<()> {
        let mut state = self.state.lock().await;
        let sql = match state.depth {
            0 => return Err(BridgeError::validation("commit without an open transaction scope")),
            1 => "commit".to_string(),
            depth => format!("release savepoint {}", Self::savepoint_name(depth - 1)),
        };
        state.depth -= 1;
        sqlx::query(&sql)
            .persistent(false)
            .execute(&mut state.conn)
            .await
            .map_err(local_error)?;
        Ok(())
    }

    async fn rollback(&self) -> BridgeResult<()> {
        let mut state = self.state.lock().await;
        let statements = match state.depth {
            0 => return Err(BridgeError::validation("rollback without an open transaction scope")),
            1 => vec!["rollback".to_string()],
            depth => {
                let name = Self::savepoint_name(depth - 1);
                vec![
                    format!("rollback to savepoint {name}"),
                    format!("release savepoint {name}"),
                ]
            }
        };
        state.depth -= 1;
        for sql in &statements {
            sqlx::query(sql)
                .persistent(false)
                .execute(&mut state.conn)
                .await
                .map_err(local_error)?;
        }
        Ok(())
    }
}

/// Binds `value` as a parameter of the declared column type. NULLs are bound
/// typed so PostgreSQL never has to guess a parameter type.
fn bind_typed<'q>(query: PgQuery<'q>, ty: LocalType, value: &'q Value) -> BridgeResult<PgQuery<'q>> {
    let bound = match (ty, value) {
        (LocalType::BigInt, Value::Null) => query.bind(None::<i64>),
        (LocalType::Boolean, Value::Null) => query.bind(None::<bool>),
        (LocalType::DoublePrecision, Value::Null) => query.bind(None::<f64>),
        (LocalType::Text | LocalType::VarChar(_), Value::Null) => query.bind(None::<String>),

        (LocalType::BigInt, Value::Int(i)) => query.bind(*i),
        (LocalType::BigInt, Value::Text(s)) => query.bind(parse_param::<i64>(s, ty)?),

        (LocalType::Boolean, Value::Bool(b)) => query.bind(*b),

        (LocalType::DoublePrecision, Value::Float(f)) => query.bind(*f),
        (LocalType::DoublePrecision, Value::Int(i)) => query.bind(*i as f64),
        // Presto sends NaN and infinities as strings
        (LocalType::DoublePrecision, Value::Text(s)) => query.bind(parse_param::<f64>(s, ty)?),

        (LocalType::Text | LocalType::VarChar(_), Value::Text(s)) => query.bind(s.as_str()),
        (LocalType::Text | LocalType::VarChar(_), other) => query.bind(other.to_text()),

        (ty, other) => {
            return Err(BridgeError::validation(format!(
                "cannot bind {other:?} to a {ty} parameter"
            )))
        }
    };
    Ok(bound)
}

fn parse_param<T: std::str::FromStr>(raw: &str, ty: LocalType) -> BridgeResult<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| BridgeError::validation(format!("cannot bind '{raw}' to a {ty} parameter")))
}

fn local_error(err: sqlx::Error) -> BridgeError {
    let sqlstate = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned());
    BridgeError::local_execution_with_state(err.to_string(), sqlstate)
}
