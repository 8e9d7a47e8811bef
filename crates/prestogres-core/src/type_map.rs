// SPDX-License-Identifier: Apache-2.0

//! Remote-to-local column type translation.
//!
//! One table serves both operations. Result materialization keeps full
//! fidelity (`text`), the catalog mirror only needs the shape of a table and
//! gets bounded `varchar` placeholders instead.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Length cap for text columns of mirrored catalog tables.
pub const CATALOG_VARCHAR_LENGTH: u32 = 100;

/// Where a mapped type is going to be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeContext {
    ResultSet,
    CatalogMirror,
}

/// Native PostgreSQL column types emitted by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalType {
    Text,
    VarChar(u32),
    BigInt,
    Boolean,
    DoublePrecision,
}

impl fmt::Display for LocalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalType::Text => f.write_str("text"),
            LocalType::VarChar(len) => write!(f, "varchar({len})"),
            LocalType::BigInt => f.write_str("bigint"),
            LocalType::Boolean => f.write_str("boolean"),
            LocalType::DoublePrecision => f.write_str("double precision"),
        }
    }
}

/// Maps a remote engine type name to the local type for `context`.
pub fn map_type(remote_type: &str, context: TypeContext) -> BridgeResult<LocalType> {
    let lower = remote_type.trim().to_lowercase();

    // Bounded varchars are reported as `varchar(n)`
    let base = match lower.strip_prefix("varchar(") {
        Some(rest) if rest.ends_with(')') => "varchar",
        _ => lower.as_str(),
    };

    match (base, context) {
        ("varchar", TypeContext::ResultSet) => Ok(LocalType::Text),
        ("varchar", TypeContext::CatalogMirror) => Ok(LocalType::VarChar(CATALOG_VARCHAR_LENGTH)),
        ("bigint", _) => Ok(LocalType::BigInt),
        ("boolean", _) => Ok(LocalType::Boolean),
        ("double", _) => Ok(LocalType::DoublePrecision),
        _ => Err(BridgeError::unsupported_type(remote_type)),
    }
}
