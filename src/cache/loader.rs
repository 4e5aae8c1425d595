//! Cache loader
//!
//! Pulls previously computed aggregates for a request out of the cache
//! store and records them as covered intervals in the request's
//! [`WindowSet`]. Entries at the request step are applied first, then
//! entries at finer compatible steps fill whatever is still missing.

use tracing::{debug, warn};

use crate::aggregation::Reducer;
use crate::types::Tags;
use crate::window::WindowSet;

use super::store::{CacheQuery, CacheStore};

/// Divisors used to derive finer compatible steps
pub const DEFAULT_STEP_DIVISORS: [i64; 8] = [2, 4, 5, 6, 7, 10, 12, 24];

/// Steps whose cached entries can be reused for a request at `step`
///
/// Always contains `step` itself, followed by `step / d` for every divisor
/// `d` that divides `step` exactly. Ordered descending, without duplicates.
pub fn compatible_steps(step: i64, divisors: &[i64]) -> Vec<i64> {
    let mut steps: Vec<i64> = std::iter::once(step)
        .chain(
            divisors
                .iter()
                .filter(|&&d| d > 1 && step % d == 0)
                .map(|&d| step / d),
        )
        .collect();

    steps.sort_unstable_by(|a, b| b.cmp(a));
    steps.dedup();
    steps
}

/// Outcome of one load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Entries returned by the store
    pub fetched: usize,
    /// Entries recorded as covered
    pub applied: usize,
    /// Entries that did not fit the remaining coverage
    pub skipped: usize,
    /// The store lookup failed and nothing was applied
    pub read_failed: bool,
}

/// Applies cached entries to a window set
#[derive(Debug, Clone)]
pub struct CacheLoader {
    divisors: Vec<i64>,
}

impl Default for CacheLoader {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_DIVISORS.to_vec())
    }
}

impl CacheLoader {
    /// Create a loader using the given step divisors
    pub fn new(divisors: Vec<i64>) -> Self {
        Self { divisors }
    }

    /// Build the store lookup for a window set
    pub fn query_for(
        &self,
        metric: &str,
        function: Reducer,
        tags: &Tags,
        windows: &WindowSet,
    ) -> CacheQuery {
        CacheQuery {
            metric: metric.to_string(),
            function,
            steps: compatible_steps(windows.step(), &self.divisors),
            tags: tags.clone(),
            start: windows.start(),
            stop: windows.stop().saturating_add(1),
        }
    }

    /// Fetch compatible entries and mark them covered in `windows`
    ///
    /// A failing store is treated as an empty cache: the request is still
    /// answered, only more expensively.
    pub async fn load(
        &self,
        cache: &dyn CacheStore,
        query: &CacheQuery,
        windows: &mut WindowSet,
    ) -> LoadReport {
        let entries = match cache.find(query).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    store = cache.store_id(),
                    metric = %query.metric,
                    error = %e,
                    "Cache lookup failed, continuing without cached values"
                );
                return LoadReport {
                    read_failed: true,
                    ..LoadReport::default()
                };
            }
        };

        let mut report = LoadReport {
            fetched: entries.len(),
            ..LoadReport::default()
        };

        for entry in &entries {
            match windows.add_covered(entry.interval()) {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    debug!(
                        window_start = entry.window_start,
                        step = entry.step,
                        error = %e,
                        "Skipping cache entry"
                    );
                    report.skipped += 1;
                }
            }
        }

        debug!(
            metric = %query.metric,
            fetched = report.fetched,
            applied = report.applied,
            skipped = report.skipped,
            "Cache load complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryCacheStore;
    use crate::cache::store::CacheEntry;
    use crate::error::CacheStoreError;
    use crate::window::Coverage;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;

    fn entry(window_start: i64, step: i64, value: f64) -> CacheEntry {
        CacheEntry {
            metric: "sample".to_string(),
            window_start,
            step,
            function: Reducer::Sum,
            tags: Tags::new(),
            value,
            write_time: Utc::now(),
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl CacheStore for BrokenCache {
        fn store_id(&self) -> &str {
            "broken"
        }

        async fn find(&self, _query: &CacheQuery) -> Result<Vec<CacheEntry>, CacheStoreError> {
            Err(CacheStoreError::Read("connection reset".to_string()))
        }

        async fn insert(&self, _entry: CacheEntry) -> Result<(), CacheStoreError> {
            Err(CacheStoreError::Write("connection reset".to_string()))
        }
    }

    #[test]
    fn test_compatible_steps() {
        assert_eq!(
            compatible_steps(60, &DEFAULT_STEP_DIVISORS),
            vec![60, 30, 15, 12, 10, 6, 5]
        );
        assert_eq!(compatible_steps(10, &DEFAULT_STEP_DIVISORS), vec![10, 5, 2, 1]);
        assert_eq!(compatible_steps(7, &DEFAULT_STEP_DIVISORS), vec![7, 1]);
        assert_eq!(compatible_steps(1, &DEFAULT_STEP_DIVISORS), vec![1]);
    }

    #[tokio::test]
    async fn test_load_prefers_coarse_entries() {
        let cache = InMemoryCacheStore::new(Duration::from_secs(300), 100);
        cache.insert(entry(0, 10, 45.0)).await.unwrap();
        // Finer entries overlapping the coarse one are skipped
        cache.insert(entry(0, 5, 10.0)).await.unwrap();
        // Finer entries fill the gap in the second window
        cache.insert(entry(10, 5, 60.0)).await.unwrap();

        let mut windows = WindowSet::new(0, 19, 10).unwrap();
        let loader = CacheLoader::default();
        let query = loader.query_for("sample", Reducer::Sum, &Tags::new(), &windows);
        let report = loader.load(&cache, &query, &mut windows).await;

        assert_eq!(report.fetched, 3);
        assert_eq!(report.applied, 2);
        assert_eq!(report.skipped, 1);

        assert_eq!(windows.windows()[0].coverage(), Coverage::Full);
        assert_eq!(windows.windows()[1].coverage(), Coverage::Partial);
        assert_eq!(windows.windows()[1].missing()[0].start, 15);
    }

    #[tokio::test]
    async fn test_load_ignores_incompatible_steps() {
        let cache = InMemoryCacheStore::new(Duration::from_secs(300), 100);
        cache.insert(entry(0, 3, 3.0)).await.unwrap();

        let mut windows = WindowSet::new(0, 9, 10).unwrap();
        let loader = CacheLoader::default();
        let query = loader.query_for("sample", Reducer::Sum, &Tags::new(), &windows);
        let report = loader.load(&cache, &query, &mut windows).await;

        assert_eq!(report, LoadReport::default());
        assert!(windows.windows()[0].is_empty());
    }

    #[tokio::test]
    async fn test_load_read_failure_degrades() {
        let mut windows = WindowSet::new(0, 19, 10).unwrap();
        let loader = CacheLoader::default();
        let query = loader.query_for("sample", Reducer::Sum, &Tags::new(), &windows);
        let report = loader.load(&BrokenCache, &query, &mut windows).await;

        assert!(report.read_failed);
        assert_eq!(report.applied, 0);
        assert!(windows.windows().iter().all(|w| w.is_empty()));
    }
}
