//! Cache store interface
//!
//! The cache store persists per-window aggregates computed by earlier
//! requests. Entries are immutable snapshots: a fresh computation always
//! inserts a new entry, duplicates for the same window are tolerated, and
//! expiry is handled by the store itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::aggregation::Reducer;
use crate::error::CacheStoreError;
use crate::types::{Tags, Timestamp};
use crate::window::Interval;

/// One cached window aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Metric the aggregate was computed for
    pub metric: String,

    /// Aligned start of the window
    pub window_start: Timestamp,

    /// Window span the value covers
    pub step: i64,

    /// Aggregation function that produced the value
    pub function: Reducer,

    /// Equality tags of the producing request
    #[serde(default)]
    pub tags: Tags,

    /// Aggregated value
    pub value: f64,

    /// When the entry was written
    pub write_time: DateTime<Utc>,
}

impl CacheEntry {
    /// Interval `[window_start, window_start + step - 1]` carrying the value
    pub fn interval(&self) -> Interval {
        let stop = self
            .window_start
            .saturating_add(self.step.saturating_sub(1));
        Interval::with_value(self.window_start, stop, self.value)
    }
}

/// Lookup of entries compatible with a request
#[derive(Debug, Clone, PartialEq)]
pub struct CacheQuery {
    /// Metric name
    pub metric: String,

    /// Aggregation function
    pub function: Reducer,

    /// Acceptable entry steps
    pub steps: Vec<i64>,

    /// Equality tags entries must carry exactly
    pub tags: Tags,

    /// First window start (inclusive)
    pub start: Timestamp,

    /// Last window start (exclusive)
    pub stop: Timestamp,
}

impl CacheQuery {
    /// True when the entry answers this query
    pub fn matches(&self, entry: &CacheEntry) -> bool {
        entry.metric == self.metric
            && entry.function == self.function
            && self.steps.contains(&entry.step)
            && entry.tags == self.tags
            && self.start <= entry.window_start
            && entry.window_start < self.stop
    }
}

/// Order entries by step descending, then window start ascending
///
/// Coarser entries come first so they consolidate as much of a window as
/// possible before finer entries are considered.
pub fn sort_entries(entries: &mut [CacheEntry]) {
    entries.sort_by(|a, b| match b.step.cmp(&a.step) {
        Ordering::Equal => a.window_start.cmp(&b.window_start),
        other => other,
    });
}

/// Store of previously computed window aggregates
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Identifier of the store implementation, used in logs
    fn store_id(&self) -> &str;

    /// Live entries matching the query, ordered as by [`sort_entries`]
    async fn find(&self, query: &CacheQuery) -> Result<Vec<CacheEntry>, CacheStoreError>;

    /// Persist one entry
    async fn insert(&self, entry: CacheEntry) -> Result<(), CacheStoreError>;
}
