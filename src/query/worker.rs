//! Workers - units of backing store work produced by the planner
//!
//! A [`BulkWorker`] answers a run of uncovered windows with one bucketed
//! backing store query. A [`PartialWorker`] answers a single window that is
//! at least partly cached: it queries each missing interval on its own and
//! reduces the fresh values together with the cached ones.
//!
//! Workers are independent of each other and may run concurrently.

use futures::future::try_join_all;
use tracing::debug;

use crate::aggregation::Reducer;
use crate::error::BackingStoreError;
use crate::storage::BackingStore;
use crate::types::{ResultRow, TagFilters, Timestamp};
use crate::window::Window;

use super::pipeline::PipelineGenerator;
use super::request::AggregationQuery;

// ============================================================================
// Context and Output
// ============================================================================

/// Request parameters shared by every worker of a request
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerContext {
    /// Metric name
    pub metric: String,
    /// Aggregation function
    pub reducer: Reducer,
    /// Tag filters
    pub filters: TagFilters,
}

impl WorkerContext {
    /// Context for a parsed request
    pub fn from_query(query: &AggregationQuery) -> Self {
        Self {
            metric: query.metric.clone(),
            reducer: query.reducer,
            filters: query.filters.clone(),
        }
    }

    /// Row for a locally reduced value, tagged with the equality filters
    fn row(&self, window_start: Timestamp, value: f64) -> ResultRow {
        let row = ResultRow::new(window_start, value);
        if self.filters.is_empty() {
            row
        } else {
            row.with_tags(self.filters.equality_tags())
        }
    }
}

/// Rows produced by one worker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerOutput {
    /// Result rows keyed by window start
    pub rows: Vec<ResultRow>,
    /// Backing store queries issued
    pub backend_queries: usize,
}

// ============================================================================
// Workers
// ============================================================================

/// Bucketed query over a run of uncovered windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkWorker {
    start: Timestamp,
    stop: Timestamp,
    step: i64,
}

impl BulkWorker {
    /// Worker over `[start, stop]` with buckets of `step`
    pub fn new(start: Timestamp, stop: Timestamp, step: i64) -> Self {
        Self { start, stop, step }
    }

    /// First timestamp covered
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Last timestamp covered
    pub fn stop(&self) -> Timestamp {
        self.stop
    }

    /// Bucket span
    pub fn step(&self) -> i64 {
        self.step
    }

    /// Run the query, returning one row per window and tag combination
    ///
    /// Bucket keys below `start` belong to a window shortened by the query
    /// bounds and are clamped to `start`.
    pub async fn execute(
        &self,
        ctx: &WorkerContext,
        backend: &dyn BackingStore,
    ) -> Result<WorkerOutput, BackingStoreError> {
        let pipeline =
            PipelineGenerator::bucketed(self.start, self.stop, self.step, ctx.reducer, &ctx.filters);
        let groups = backend.aggregate(&ctx.metric, &pipeline).await?;

        let rows = groups
            .into_iter()
            .map(|group| ResultRow {
                window_start: group.date.unwrap_or(self.start).max(self.start),
                tags: group.tags,
                value: group.value,
            })
            .collect();

        Ok(WorkerOutput {
            rows,
            backend_queries: 1,
        })
    }
}

/// Per-interval queries for one partly or fully cached window
#[derive(Debug, Clone, PartialEq)]
pub struct PartialWorker {
    window: Window,
}

impl PartialWorker {
    /// Worker for a window
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    /// Window being resolved
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Query each missing interval and reduce with the cached values
    ///
    /// Each interval query returns a single pre-reduced value, so the fresh
    /// and cached values can be reduced again with the same function. A
    /// fully covered window issues no queries at all.
    pub async fn execute(
        &self,
        ctx: &WorkerContext,
        backend: &dyn BackingStore,
    ) -> Result<WorkerOutput, BackingStoreError> {
        let missing = self.window.missing();

        let fresh = try_join_all(missing.iter().map(|interval| async move {
            let pipeline = PipelineGenerator::single(interval, ctx.reducer, &ctx.filters);
            let groups = backend.aggregate(&ctx.metric, &pipeline).await?;
            Ok::<_, BackingStoreError>(groups.first().map(|group| group.value))
        }))
        .await?;

        let value = ctx
            .reducer
            .reduce(fresh.into_iter().flatten().chain(self.window.covered_values()));

        debug!(
            window_start = self.window.start(),
            missing = missing.len(),
            covered = self.window.covered().len(),
            "Partial worker complete"
        );

        Ok(WorkerOutput {
            rows: value
                .map(|value| vec![ctx.row(self.window.start(), value)])
                .unwrap_or_default(),
            backend_queries: missing.len(),
        })
    }
}

/// Unit of work emitted by the planner
#[derive(Debug, Clone, PartialEq)]
pub enum Worker {
    /// Run of uncovered windows
    Bulk(BulkWorker),
    /// Single window with cached coverage
    Partial(PartialWorker),
}

impl Worker {
    /// Execute against the backing store
    pub async fn execute(
        &self,
        ctx: &WorkerContext,
        backend: &dyn BackingStore,
    ) -> Result<WorkerOutput, BackingStoreError> {
        match self {
            Worker::Bulk(worker) => worker.execute(ctx, backend).await,
            Worker::Partial(worker) => worker.execute(ctx, backend).await,
        }
    }

    /// True for bulk workers
    pub fn is_bulk(&self) -> bool {
        matches!(self, Worker::Bulk(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryPointStore;
    use crate::types::DataPoint;
    use crate::window::{Interval, WindowSet};

    fn ctx(reducer: Reducer, filters: TagFilters) -> WorkerContext {
        WorkerContext {
            metric: "sample".to_string(),
            reducer,
            filters,
        }
    }

    fn store() -> InMemoryPointStore {
        let store = InMemoryPointStore::new();
        store.insert_many((0..20).map(|ts| DataPoint::new("sample", ts, ts as f64)));
        store
    }

    #[tokio::test]
    async fn test_bulk_rows_per_window() {
        let store = store();
        let output = BulkWorker::new(0, 19, 10)
            .execute(&ctx(Reducer::Sum, TagFilters::new()), &store)
            .await
            .unwrap();

        assert_eq!(output.backend_queries, 1);
        assert_eq!(
            output.rows,
            vec![ResultRow::new(0, 45.0), ResultRow::new(10, 145.0)]
        );
    }

    #[tokio::test]
    async fn test_bulk_clamps_unaligned_start() {
        let store = store();
        let output = BulkWorker::new(3, 14, 10)
            .execute(&ctx(Reducer::Max, TagFilters::new()), &store)
            .await
            .unwrap();

        assert_eq!(
            output.rows,
            vec![ResultRow::new(3, 9.0), ResultRow::new(10, 14.0)]
        );
    }

    #[tokio::test]
    async fn test_partial_combines_cached_and_fresh() {
        let store = store();
        let mut windows = WindowSet::new(10, 19, 10).unwrap();
        // Cached value deliberately differs from the raw data
        windows.add_covered(Interval::with_value(12, 15, 100.0)).unwrap();

        let worker = PartialWorker::new(windows.windows()[0].clone());
        let output = worker
            .execute(&ctx(Reducer::Sum, TagFilters::new()), &store)
            .await
            .unwrap();

        // [10, 11] = 21, [16, 19] = 70
        assert_eq!(output.backend_queries, 2);
        assert_eq!(output.rows, vec![ResultRow::new(10, 191.0)]);
    }

    #[tokio::test]
    async fn test_full_window_issues_no_queries() {
        let store = store();
        let mut windows = WindowSet::new(0, 9, 10).unwrap();
        windows.add_covered(Interval::with_value(0, 4, 3.0)).unwrap();
        windows.add_covered(Interval::with_value(5, 9, 8.0)).unwrap();

        let worker = Worker::Partial(PartialWorker::new(windows.windows()[0].clone()));
        let output = worker
            .execute(&ctx(Reducer::Min, TagFilters::new()), &store)
            .await
            .unwrap();

        assert_eq!(output.backend_queries, 0);
        assert_eq!(output.rows, vec![ResultRow::new(0, 3.0)]);
        assert_eq!(store.queries_executed(), 0);
    }

    #[tokio::test]
    async fn test_partial_rows_carry_equality_tags() {
        let store = InMemoryPointStore::new();
        store.insert(DataPoint::new("sample", 1, 5.0).with_tag("host", "1"));
        store.insert(DataPoint::new("sample", 2, 7.0).with_tag("host", "2"));

        let mut windows = WindowSet::new(0, 9, 10).unwrap();
        windows.add_covered(Interval::with_value(5, 9, 1.0)).unwrap();

        let filters = TagFilters::new().with("host", "2");
        let output = PartialWorker::new(windows.windows()[0].clone())
            .execute(&ctx(Reducer::Sum, filters.clone()), &store)
            .await
            .unwrap();

        assert_eq!(output.rows.len(), 1);
        assert_eq!(output.rows[0].value, 8.0);
        assert_eq!(output.rows[0].tags, Some(filters.equality_tags()));
    }

    #[tokio::test]
    async fn test_partial_without_values_yields_no_row() {
        let store = InMemoryPointStore::new();
        let mut windows = WindowSet::new(0, 9, 10).unwrap();
        windows.add_covered(Interval::new(0, 4)).unwrap();

        let output = PartialWorker::new(windows.windows()[0].clone())
            .execute(&ctx(Reducer::Sum, TagFilters::new()), &store)
            .await
            .unwrap();

        assert!(output.rows.is_empty());
        assert_eq!(output.backend_queries, 1);
    }
}
