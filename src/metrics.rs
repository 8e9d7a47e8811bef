// SPDX-License-Identifier: Apache-2.0

//! Lightweight in-process counters for materializations and catalog syncs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use serde::Serialize;

#[derive(Default)]
struct BridgeMetrics {
    materializations: AtomicU64,
    materialization_failures: AtomicU64,
    rows_loaded: AtomicU64,
    batches_flushed: AtomicU64,
    syncs_rebuilt: AtomicU64,
    syncs_cached: AtomicU64,
    syncs_empty: AtomicU64,
    sync_failures: AtomicU64,
}

static BRIDGE_METRICS: OnceLock<BridgeMetrics> = OnceLock::new();

fn metrics() -> &'static BridgeMetrics {
    BRIDGE_METRICS.get_or_init(BridgeMetrics::default)
}

pub fn record_materialization(rows: u64, batches: u64) {
    let metrics = metrics();
    metrics.materializations.fetch_add(1, Ordering::Relaxed);
    metrics.rows_loaded.fetch_add(rows, Ordering::Relaxed);
    metrics.batches_flushed.fetch_add(batches, Ordering::Relaxed);
}

pub fn record_materialization_failure() {
    metrics().materialization_failures.fetch_add(1, Ordering::Relaxed);
}

pub fn record_sync_rebuilt() {
    metrics().syncs_rebuilt.fetch_add(1, Ordering::Relaxed);
}

pub fn record_sync_cached() {
    metrics().syncs_cached.fetch_add(1, Ordering::Relaxed);
}

pub fn record_sync_empty() {
    metrics().syncs_empty.fetch_add(1, Ordering::Relaxed);
}

pub fn record_sync_failure() {
    metrics().sync_failures.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Clone, Serialize)]
pub struct BridgeMetricsSnapshot {
    pub materializations: u64,
    pub materialization_failures: u64,
    pub rows_loaded: u64,
    pub batches_flushed: u64,
    pub syncs_rebuilt: u64,
    pub syncs_cached: u64,
    pub syncs_empty: u64,
    pub sync_failures: u64,
}

pub fn snapshot() -> BridgeMetricsSnapshot {
    let metrics = metrics();
    BridgeMetricsSnapshot {
        materializations: metrics.materializations.load(Ordering::Relaxed),
        materialization_failures: metrics.materialization_failures.load(Ordering::Relaxed),
        rows_loaded: metrics.rows_loaded.load(Ordering::Relaxed),
        batches_flushed: metrics.batches_flushed.load(Ordering::Relaxed),
        syncs_rebuilt: metrics.syncs_rebuilt.load(Ordering::Relaxed),
        syncs_cached: metrics.syncs_cached.load(Ordering::Relaxed),
        syncs_empty: metrics.syncs_empty.load(Ordering::Relaxed),
        sync_failures: metrics.sync_failures.load(Ordering::Relaxed),
    }
}
