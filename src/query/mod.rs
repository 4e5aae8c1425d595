//! Query path for windowed aggregation requests
//!
//! # Architecture
//!
//! ```text
//! QueryRequest
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Parse     │  "<function>(<metric>)" → AggregationQuery
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │ Load cache  │  Cached aggregates → covered intervals
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │    Plan     │  Bulk workers for empty runs, partial workers otherwise
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Execute    │  Pipelines against the backing store, in parallel
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │ Write back  │  Full-span window rows → cache
//! └─────────────┘
//! ```

pub mod dispatcher;
pub mod pipeline;
pub mod planner;
pub mod request;
pub mod worker;

// Re-export main types
pub use dispatcher::{DispatcherConfig, DispatcherStats, DispatcherStatsSnapshot, RequestDispatcher};
pub use pipeline::{BucketStage, GroupStage, MatchStage, Pipeline, PipelineGenerator};
pub use planner::WorkerPlanner;
pub use request::{parse_request_call, AggregationQuery, QueryRequest};
pub use worker::{BulkWorker, PartialWorker, Worker, WorkerContext, WorkerOutput};
