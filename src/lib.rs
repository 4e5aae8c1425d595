//! Kuba Window Cache - time-windowed aggregation cache for time-series queries
//!
//! Answers `sum`, `min`, `max` and `avg` aggregations over step-aligned
//! windows, reusing per-window aggregates computed by earlier requests:
//! - Coverage tracking of cached versus missing intervals per window
//! - Coalesced bucketed queries for runs of uncovered windows
//! - Reuse of cached aggregates at finer compatible steps
//! - Pluggable backing store and cache store behind async traits
//!
//! # Example
//!
//! ```rust
//! use kuba_window_cache::cache::InMemoryCacheStore;
//! use kuba_window_cache::query::{QueryRequest, RequestDispatcher};
//! use kuba_window_cache::storage::InMemoryPointStore;
//! use kuba_window_cache::types::DataPoint;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> kuba_window_cache::Result<()> {
//! let points = Arc::new(InMemoryPointStore::new());
//! points.insert(DataPoint::new("sample", 5, 6.0));
//! points.insert(DataPoint::new("sample", 12, 7.0));
//!
//! let cache = Arc::new(InMemoryCacheStore::new(Duration::from_secs(300), 10_000));
//! let dispatcher = RequestDispatcher::new(points, cache);
//!
//! let rows = dispatcher
//!     .request(&QueryRequest::new("sum(sample)", 0, 19, 10))
//!     .await?;
//! assert_eq!(rows.len(), 2);
//! assert_eq!(rows[0].value, 6.0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

/// Time windows and coverage bookkeeping
pub mod window;

/// Aggregation functions and incremental reduction state
pub mod aggregation;

/// Configuration management with TOML support
pub mod config;

/// Raw point storage behind the `BackingStore` trait
pub mod storage;

/// Cached window aggregates: store, loader and writer
pub mod cache;

/// Request parsing, pipeline generation, planning, workers and dispatch
pub mod query;

// Re-export main types
pub use error::{Error, Result};
pub use query::{QueryRequest, RequestDispatcher};
pub use types::{DataPoint, ResultRow, TagFilter, TagFilters};
