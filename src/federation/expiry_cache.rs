// SPDX-License-Identifier: Apache-2.0

//! Recency cache for catalog syncs.
//!
//! Remembers when each `(server, user, catalog)` was last rebuilt. An entry
//! is fresh while `now - stamp < ttl`; stale entries are dropped when seen.
//! Capacity is bounded, least recently used entries go first.

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use parking_lot::Mutex;

use prestogres_core::CacheKey;

/// Time source for expiry decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

pub struct ExpiryCache {
    entries: Mutex<LruCache<CacheKey, DateTime<Utc>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ExpiryCache {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: NonZeroUsize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// True when `key` was recorded less than `ttl` ago. A stale entry is
    /// removed.
    pub fn is_fresh(&self, key: &CacheKey) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(stamp) if now - *stamp < self.ttl => true,
            Some(_) => {
                entries.pop(key);
                false
            }
            None => false,
        }
    }

    /// Stamps `key` with the current time.
    pub fn record(&self, key: CacheKey) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        if entries.len() == entries.cap().get() && !entries.contains(&key) {
            Self::purge_locked(&mut entries, now, self.ttl);
        }
        entries.put(key, now);
    }

    /// Drops every stale entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        Self::purge_locked(&mut entries, now, self.ttl)
    }

    fn purge_locked(
        entries: &mut LruCache<CacheKey, DateTime<Utc>>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> usize {
        let stale: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, stamp)| now - **stamp >= ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
