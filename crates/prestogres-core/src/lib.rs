// SPDX-License-Identifier: Apache-2.0

//! Core abstractions shared by the Presto/PostgreSQL bridge.
//!
//! Holds the value model, the collaborator traits (remote engine, local
//! executor), the shared remote-to-local type mapping and the error type.

pub mod error;
pub mod quote;
pub mod traits;
pub mod type_map;
pub mod types;

pub use error::{BridgeError, BridgeResult, ErrorKind};
pub use quote::quote_ident;
pub use traits::{LocalExecutor, RemoteCatalogReader, RemoteQuery, RemoteQueryEngine};
pub use type_map::{map_type, LocalType, TypeContext, CATALOG_VARCHAR_LENGTH};
pub use types::*;
