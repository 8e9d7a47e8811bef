// SPDX-License-Identifier: Apache-2.0

//! Presto to PostgreSQL bridge
//!
//! Two operations make a remote engine look local to PostgreSQL clients:
//! [`ResultMaterializer`] copies one query result into a temp table, and
//! [`CatalogSynchronizer`] mirrors the remote catalog as empty tables.
//! [`Bridge`] wires both to one configuration.

pub mod catalog_sync;
pub mod expiry_cache;
pub mod materializer;

use std::num::NonZeroUsize;
use std::sync::Arc;

use prestogres_core::{
    BridgeError, BridgeResult, ConnectionInfo, LocalExecutor, RemoteCatalogReader,
    RemoteQueryEngine,
};
use prestogres_drivers::PrestoClient;

use crate::config::BridgeConfig;

pub use catalog_sync::{CatalogSynchronizer, SchemaMap, SyncOutcome};
pub use expiry_cache::{Clock, ExpiryCache, ManualClock, SystemClock};
pub use materializer::{MaterializeSummary, ResultMaterializer};

/// Entry points exposed to the host
pub struct Bridge {
    materializer: ResultMaterializer,
    synchronizer: CatalogSynchronizer,
}

impl Bridge {
    pub fn new(
        config: &BridgeConfig,
        remote: Arc<dyn RemoteQueryEngine>,
        catalog: Arc<dyn RemoteCatalogReader>,
        local: Arc<dyn LocalExecutor>,
    ) -> BridgeResult<Self> {
        Self::with_clock(config, remote, catalog, local, Arc::new(SystemClock))
    }

    /// Like [`Bridge::new`] with an explicit time source for the sync cache.
    pub fn with_clock(
        config: &BridgeConfig,
        remote: Arc<dyn RemoteQueryEngine>,
        catalog: Arc<dyn RemoteCatalogReader>,
        local: Arc<dyn LocalExecutor>,
        clock: Arc<dyn Clock>,
    ) -> BridgeResult<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.cache_capacity)
            .ok_or_else(|| BridgeError::validation("cache_capacity must be at least 1"))?;
        let cache = Arc::new(ExpiryCache::with_clock(capacity, config.cache_ttl(), clock));

        let materializer = ResultMaterializer::new(remote, Arc::clone(&local))
            .with_batch_threshold(config.batch_threshold);
        let synchronizer =
            CatalogSynchronizer::new(catalog, local, cache, config.namespaces.clone());

        Ok(Self {
            materializer,
            synchronizer,
        })
    }

    /// Bridge talking to Presto over HTTP for both results and catalog.
    pub fn presto(config: &BridgeConfig, local: Arc<dyn LocalExecutor>) -> BridgeResult<Self> {
        let client = Arc::new(PrestoClient::with_source(config.presto_source.clone()));
        Self::new(config, client.clone(), client, local)
    }

    /// Runs `query` remotely and loads the result into temp table `table_name`.
    pub async fn run_as_temp_table(
        &self,
        conn: &ConnectionInfo,
        table_name: &str,
        query: &str,
    ) -> BridgeResult<MaterializeSummary> {
        self.materializer.materialize(conn, table_name, query).await
    }

    /// Mirrors the remote catalog locally, at most once per TTL per
    /// `(server, user, catalog)`.
    pub async fn create_tables(&self, conn: &ConnectionInfo) -> BridgeResult<SyncOutcome> {
        self.synchronizer.sync(conn).await
    }

    pub fn materializer(&self) -> &ResultMaterializer {
        &self.materializer
    }

    pub fn synchronizer(&self) -> &CatalogSynchronizer {
        &self.synchronizer
    }
}
