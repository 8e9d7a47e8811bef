// Prestogres - Presto results and catalog for PostgreSQL clients
// Core library

pub mod config;
pub mod federation;
pub mod metrics;
pub mod observability;

pub use config::{BridgeConfig, LoggingConfig, NamespacePolicy};
pub use federation::{
    Bridge, CatalogSynchronizer, Clock, ExpiryCache, ManualClock, MaterializeSummary,
    ResultMaterializer, SchemaMap, SyncOutcome, SystemClock,
};
pub use prestogres_core::{BridgeError, BridgeResult, ConnectionInfo, ErrorKind};
