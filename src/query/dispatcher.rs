//! Request Dispatcher - entry point for aggregation requests
//!
//! Decides whether a request may use the cache, then drives the cache
//! loader, worker planner, workers and cache writer.
//!
//! ```text
//! QueryRequest ──► parse ──► cacheable? ──no──► one bucketed query ──► rows
//!                                │
//!                               yes
//!                                ▼
//!          WindowSet ──► CacheLoader ──► WorkerPlanner ──► workers (parallel)
//!                                                               │
//!                                         rows ◄── CacheWriter ◄┘
//! ```

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::cache::{CacheLoader, CacheStore, CacheWriter, DEFAULT_STEP_DIVISORS};
use crate::config::Config;
use crate::error::{Error, Result, ValidationError};
use crate::storage::BackingStore;
use crate::types::ResultRow;
use crate::window::WindowSet;

use super::planner::WorkerPlanner;
use super::request::{AggregationQuery, QueryRequest};
use super::worker::{BulkWorker, Worker, WorkerContext, WorkerOutput};

// ============================================================================
// Configuration
// ============================================================================

/// Dispatcher settings
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Serve cacheable requests through the cache
    pub cache_enabled: bool,

    /// Divisors used to derive compatible cache steps
    pub step_divisors: Vec<i64>,

    /// Maximum workers running at once per request
    pub max_parallel_workers: usize,

    /// Deadline for worker execution
    pub request_timeout: Option<Duration>,

    /// Maximum windows a single request may span
    pub max_windows: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            step_divisors: DEFAULT_STEP_DIVISORS.to_vec(),
            max_parallel_workers: 8,
            request_timeout: None,
            max_windows: 100_000,
        }
    }
}

impl DispatcherConfig {
    /// Settings from the application config
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_enabled: config.cache.enabled,
            step_divisors: config.cache.step_divisors.clone(),
            max_parallel_workers: config.execution.max_parallel_workers.max(1),
            request_timeout: config.execution.request_timeout(),
            max_windows: config.execution.max_windows,
        }
    }

    /// Disable the cache
    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self
    }

    /// Set the worker execution deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Dispatcher counters
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Requests received
    pub requests: AtomicU64,

    /// Requests served without the cache
    pub bypassed: AtomicU64,

    /// Cache entries recorded as covered
    pub cache_entries_applied: AtomicU64,

    /// Cache entries that did not fit
    pub cache_entries_skipped: AtomicU64,

    /// Cache lookups that failed
    pub cache_read_failures: AtomicU64,

    /// Bulk workers run
    pub bulk_workers: AtomicU64,

    /// Partial workers run
    pub partial_workers: AtomicU64,

    /// Backing store queries issued
    pub backend_queries: AtomicU64,

    /// Cache entries written
    pub cache_rows_written: AtomicU64,

    /// Cache inserts that failed
    pub cache_write_failures: AtomicU64,
}

impl DispatcherStats {
    /// Get a snapshot of current statistics
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            cache_entries_applied: self.cache_entries_applied.load(Ordering::Relaxed),
            cache_entries_skipped: self.cache_entries_skipped.load(Ordering::Relaxed),
            cache_read_failures: self.cache_read_failures.load(Ordering::Relaxed),
            bulk_workers: self.bulk_workers.load(Ordering::Relaxed),
            partial_workers: self.partial_workers.load(Ordering::Relaxed),
            backend_queries: self.backend_queries.load(Ordering::Relaxed),
            cache_rows_written: self.cache_rows_written.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
        }
    }

    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStatsSnapshot {
    /// Requests received
    pub requests: u64,
    /// Requests served without the cache
    pub bypassed: u64,
    /// Cache entries recorded as covered
    pub cache_entries_applied: u64,
    /// Cache entries that did not fit
    pub cache_entries_skipped: u64,
    /// Cache lookups that failed
    pub cache_read_failures: u64,
    /// Bulk workers run
    pub bulk_workers: u64,
    /// Partial workers run
    pub partial_workers: u64,
    /// Backing store queries issued
    pub backend_queries: u64,
    /// Cache entries written
    pub cache_rows_written: u64,
    /// Cache inserts that failed
    pub cache_write_failures: u64,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Serves aggregation requests, reusing cached window aggregates
pub struct RequestDispatcher {
    backend: Arc<dyn BackingStore>,
    cache: Arc<dyn CacheStore>,
    config: DispatcherConfig,
    loader: CacheLoader,
    planner: WorkerPlanner,
    writer: CacheWriter,
    stats: DispatcherStats,
}

impl RequestDispatcher {
    /// Create a dispatcher with default settings
    pub fn new(backend: Arc<dyn BackingStore>, cache: Arc<dyn CacheStore>) -> Self {
        Self::with_config(backend, cache, DispatcherConfig::default())
    }

    /// Create a dispatcher with explicit settings
    pub fn with_config(
        backend: Arc<dyn BackingStore>,
        cache: Arc<dyn CacheStore>,
        config: DispatcherConfig,
    ) -> Self {
        let loader = CacheLoader::new(config.step_divisors.clone());
        Self {
            backend,
            cache,
            config,
            loader,
            planner: WorkerPlanner::new(),
            writer: CacheWriter::new(),
            stats: DispatcherStats::default(),
        }
    }

    /// Dispatcher settings
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Parse and serve a wire request
    pub async fn request(&self, request: &QueryRequest) -> Result<Vec<ResultRow>> {
        let query = AggregationQuery::from_request(request)?;
        self.execute(&query).await
    }

    /// Serve a parsed request
    #[instrument(skip(self, query), fields(metric = %query.metric, reducer = %query.reducer))]
    pub async fn execute(&self, query: &AggregationQuery) -> Result<Vec<ResultRow>> {
        self.stats.requests.fetch_add(1, Ordering::Relaxed);

        let count = WindowSet::window_count(query.start, query.stop, query.step)?;
        if count > self.config.max_windows {
            return Err(ValidationError::TooManyWindows {
                count,
                limit: self.config.max_windows,
            }
            .into());
        }

        let ctx = WorkerContext::from_query(query);

        if !self.config.cache_enabled || !query.is_cacheable() {
            debug!(
                cache_enabled = self.config.cache_enabled,
                "Bypassing cache"
            );
            self.stats.bypassed.fetch_add(1, Ordering::Relaxed);

            let worker = Worker::Bulk(BulkWorker::new(query.start, query.stop, query.step));
            let outputs = self.run_workers(&ctx, vec![worker]).await?;
            return Ok(Self::merge(outputs));
        }

        let mut windows =
            WindowSet::with_limit(query.start, query.stop, query.step, self.config.max_windows)?;
        let tags = query.filters.equality_tags();

        let cache_query = self
            .loader
            .query_for(&query.metric, query.reducer, &tags, &windows);
        let load = self
            .loader
            .load(self.cache.as_ref(), &cache_query, &mut windows)
            .await;
        DispatcherStats::add(&self.stats.cache_entries_applied, load.applied);
        DispatcherStats::add(&self.stats.cache_entries_skipped, load.skipped);
        if load.read_failed {
            self.stats.cache_read_failures.fetch_add(1, Ordering::Relaxed);
        }

        let workers = self.planner.plan(&windows);
        let outputs = self.run_workers(&ctx, workers).await?;
        let rows = Self::merge(outputs);

        let write = self
            .writer
            .write(
                self.cache.as_ref(),
                &query.metric,
                query.reducer,
                &tags,
                &windows,
                &rows,
            )
            .await;
        DispatcherStats::add(&self.stats.cache_rows_written, write.written);
        DispatcherStats::add(&self.stats.cache_write_failures, write.failed);

        info!(
            windows = windows.len(),
            rows = rows.len(),
            cached = load.applied,
            written = write.written,
            "Request served"
        );
        Ok(rows)
    }

    /// Run workers concurrently, bounded by `max_parallel_workers`
    ///
    /// The first backing store failure fails the whole request.
    async fn run_workers(
        &self,
        ctx: &WorkerContext,
        workers: Vec<Worker>,
    ) -> Result<Vec<WorkerOutput>> {
        let bulk = workers.iter().filter(|w| w.is_bulk()).count();
        DispatcherStats::add(&self.stats.bulk_workers, bulk);
        DispatcherStats::add(&self.stats.partial_workers, workers.len() - bulk);

        let backend = self.backend.as_ref();
        let run = stream::iter(workers.iter().map(|worker| worker.execute(ctx, backend)))
            .buffer_unordered(self.config.max_parallel_workers.max(1))
            .try_collect::<Vec<_>>();

        let outputs = match self.config.request_timeout {
            Some(deadline) => tokio::time::timeout(deadline, run)
                .await
                .map_err(|_| Error::Timeout(deadline))??,
            None => run.await?,
        };

        let queries: usize = outputs.iter().map(|o| o.backend_queries).sum();
        DispatcherStats::add(&self.stats.backend_queries, queries);
        Ok(outputs)
    }

    /// Concatenate worker rows, ordered by window start
    fn merge(outputs: Vec<WorkerOutput>) -> Vec<ResultRow> {
        let mut rows: Vec<ResultRow> = outputs.into_iter().flat_map(|o| o.rows).collect();
        rows.sort_by_key(|row| row.window_start);
        rows
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("backend", &self.backend.store_id())
            .field("cache", &self.cache.store_id())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheStore;
    use crate::storage::InMemoryPointStore;
    use crate::types::DataPoint;

    fn setup() -> (Arc<InMemoryPointStore>, Arc<InMemoryCacheStore>, RequestDispatcher) {
        let backend = Arc::new(InMemoryPointStore::new());
        backend.insert_many((0..20).map(|ts| DataPoint::new("sample", ts, 1.0)));
        let cache = Arc::new(InMemoryCacheStore::new(Duration::from_secs(300), 1_000));
        let dispatcher = RequestDispatcher::new(backend.clone(), cache.clone());
        (backend, cache, dispatcher)
    }

    #[tokio::test]
    async fn test_second_request_served_from_cache() {
        let (backend, cache, dispatcher) = setup();
        let request = QueryRequest::new("sum(sample)", 0, 19, 10);

        let first = dispatcher.request(&request).await.unwrap();
        assert_eq!(first, vec![ResultRow::new(0, 10.0), ResultRow::new(10, 10.0)]);
        assert_eq!(backend.queries_executed(), 1);
        assert_eq!(cache.len(), 2);

        let second = dispatcher.request(&request).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(backend.queries_executed(), 1);
        // Windows answered by a single same-step entry are not rewritten
        assert_eq!(cache.len(), 2);

        let stats = dispatcher.stats();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.cache_entries_applied, 2);
        assert_eq!(stats.partial_workers, 2);
    }

    #[tokio::test]
    async fn test_cache_disabled_bypasses() {
        let backend = Arc::new(InMemoryPointStore::new());
        backend.insert_many((0..20).map(|ts| DataPoint::new("sample", ts, 1.0)));
        let cache = Arc::new(InMemoryCacheStore::new(Duration::from_secs(300), 1_000));
        let dispatcher = RequestDispatcher::with_config(
            backend.clone(),
            cache.clone(),
            DispatcherConfig::default().without_cache(),
        );

        let request = QueryRequest::new("sum(sample)", 0, 19, 10);
        dispatcher.request(&request).await.unwrap();
        dispatcher.request(&request).await.unwrap();

        assert_eq!(backend.queries_executed(), 2);
        assert!(cache.is_empty());
        assert_eq!(dispatcher.stats().bypassed, 2);
    }

    #[tokio::test]
    async fn test_window_limit() {
        let backend = Arc::new(InMemoryPointStore::new());
        let cache = Arc::new(InMemoryCacheStore::new(Duration::from_secs(300), 1_000));
        let config = DispatcherConfig {
            max_windows: 5,
            ..DispatcherConfig::default()
        };
        let dispatcher = RequestDispatcher::with_config(backend, cache, config);

        let err = dispatcher
            .request(&QueryRequest::new("sum(sample)", 0, 99, 10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::TooManyWindows { count: 10, limit: 5 })
        ));
    }
}
