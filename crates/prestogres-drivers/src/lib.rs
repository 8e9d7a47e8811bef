// SPDX-License-Identifier: Apache-2.0

//! Concrete collaborators for the bridge
//!
//! - [`presto::PrestoClient`]: remote engine client over the Presto HTTP
//!   statement protocol.
//! - [`postgres::PostgresExecutor`]: local statement executor over SQLx.

pub mod postgres;
pub mod presto;

pub use postgres::PostgresExecutor;
pub use presto::PrestoClient;
