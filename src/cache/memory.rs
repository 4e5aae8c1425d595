//! In-memory cache store with TTL expiry
//!
//! Entries are bucketed by `(metric, function)` and become invisible once
//! they are older than the configured TTL. Expired entries are dropped by
//! [`InMemoryCacheStore::purge_expired`] or lazily when the store fills up.
//!
//! # Example
//!
//! ```rust
//! use kuba_window_cache::cache::InMemoryCacheStore;
//! use std::time::Duration;
//!
//! // 5 minute TTL, at most 10_000 live entries
//! let store = InMemoryCacheStore::new(Duration::from_secs(300), 10_000);
//! assert!(store.is_empty());
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::aggregation::Reducer;
use crate::config::CacheConfig;
use crate::error::CacheStoreError;

use super::store::{sort_entries, CacheEntry, CacheQuery, CacheStore};

/// Thread-safe in-memory cache store
#[derive(Debug)]
pub struct InMemoryCacheStore {
    /// (metric, function) -> entries in insertion order
    entries: RwLock<HashMap<(String, Reducer), Vec<CacheEntry>>>,
    /// Entry lifetime
    ttl: chrono::Duration,
    /// Maximum number of stored entries
    max_entries: usize,
}

impl InMemoryCacheStore {
    /// Create a store with the given TTL and capacity
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            max_entries,
        }
    }

    /// Create a store sized by the cache configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl(), config.max_entries)
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut guard = self.entries.write();

        let mut removed = 0;
        guard.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|entry| !self.is_expired(entry.write_time, now));
            removed += before - entries.len();
            !entries.is_empty()
        });

        if removed > 0 {
            debug!(removed, "Purged expired cache entries");
        }
        removed
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn is_expired(&self, write_time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(write_time) >= self.ttl
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    fn store_id(&self) -> &str {
        "in-memory-cache-v1"
    }

    async fn find(&self, query: &CacheQuery) -> Result<Vec<CacheEntry>, CacheStoreError> {
        let now = Utc::now();
        let guard = self.entries.read();

        let mut found: Vec<CacheEntry> = guard
            .get(&(query.metric.clone(), query.function))
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| query.matches(entry) && !self.is_expired(entry.write_time, now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        sort_entries(&mut found);
        Ok(found)
    }

    async fn insert(&self, entry: CacheEntry) -> Result<(), CacheStoreError> {
        if self.len() >= self.max_entries && self.purge_expired() == 0 {
            return Err(CacheStoreError::CapacityExceeded {
                limit: self.max_entries,
            });
        }

        self.entries
            .write()
            .entry((entry.metric.clone(), entry.function))
            .or_default()
            .push(entry);
        Ok(())
    }
}
