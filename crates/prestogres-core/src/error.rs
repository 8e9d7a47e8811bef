// SPDX-License-Identifier: Apache-2.0

//! Normalized error types for the bridge
//!
//! Failures coming from either collaborator (the remote engine client or the
//! local statement executor) are mapped to these variants so the host can
//! report a stable error identity instead of a driver-specific one.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// SQLSTATE reported by PostgreSQL for `create schema` on an existing schema.
pub const DUPLICATE_SCHEMA_SQLSTATE: &str = "42P06";

/// Unified error type for all bridge operations
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum BridgeError {
    #[error("Remote query failed: {message}")]
    RemoteQuery {
        message: String,
        error_name: Option<String>,
    },

    #[error("unknown column type: {type_name}")]
    UnsupportedType { type_name: String },

    #[error("Local execution failed: {message}")]
    LocalExecution {
        message: String,
        sqlstate: Option<String>,
    },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

/// Stable identity of a failure, used when reporting to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    RemoteQueryError,
    UnsupportedTypeError,
    LocalExecutionError,
    ValidationError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RemoteQueryError => "RemoteQueryError",
            ErrorKind::UnsupportedTypeError => "UnsupportedTypeError",
            ErrorKind::LocalExecutionError => "LocalExecutionError",
            ErrorKind::ValidationError => "ValidationError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BridgeError {
    pub fn remote_query(msg: impl Into<String>) -> Self {
        Self::RemoteQuery {
            message: msg.into(),
            error_name: None,
        }
    }

    pub fn remote_query_named(msg: impl Into<String>, error_name: impl Into<String>) -> Self {
        Self::RemoteQuery {
            message: msg.into(),
            error_name: Some(error_name.into()),
        }
    }

    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    pub fn local_execution(msg: impl Into<String>) -> Self {
        Self::LocalExecution {
            message: msg.into(),
            sqlstate: None,
        }
    }

    pub fn local_execution_with_state(msg: impl Into<String>, sqlstate: Option<String>) -> Self {
        Self::LocalExecution {
            message: msg.into(),
            sqlstate,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation { message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::RemoteQuery { .. } => ErrorKind::RemoteQueryError,
            BridgeError::UnsupportedType { .. } => ErrorKind::UnsupportedTypeError,
            BridgeError::LocalExecution { .. } => ErrorKind::LocalExecutionError,
            BridgeError::Validation { .. } => ErrorKind::ValidationError,
        }
    }

    /// Host-facing rendering: `"<kind>: <message>"`.
    pub fn report(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }

    /// True when the local database refused `create schema` because the
    /// schema is already there.
    pub fn is_duplicate_schema(&self) -> bool {
        matches!(
            self,
            BridgeError::LocalExecution { sqlstate: Some(state), .. }
                if state == DUPLICATE_SCHEMA_SQLSTATE
        )
    }
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
