//! In-memory point store
//!
//! Keeps raw points per metric and evaluates pipelines the way the backing
//! database would. Used by tests, benches and the CLI.
//!
//! # Example
//!
//! ```rust
//! use kuba_window_cache::storage::{BackingStore, InMemoryPointStore};
//! use kuba_window_cache::query::PipelineGenerator;
//! use kuba_window_cache::aggregation::Reducer;
//! use kuba_window_cache::types::{DataPoint, TagFilters};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryPointStore::new();
//! store.insert(DataPoint::new("sample", 1, 2.0));
//! store.insert(DataPoint::new("sample", 7, 4.0));
//!
//! let pipeline = PipelineGenerator::bucketed(0, 9, 10, Reducer::Sum, &TagFilters::new());
//! let rows = store.aggregate("sample", &pipeline).await?;
//! assert_eq!(rows[0].value, 6.0);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::aggregation::ReducerState;
use crate::error::BackingStoreError;
use crate::query::pipeline::Pipeline;
use crate::types::{DataPoint, Tags, Timestamp};

use super::backend::{BackingStore, GroupRow};

/// A point as stored, without the metric name
#[derive(Debug, Clone)]
struct StoredPoint {
    timestamp: Timestamp,
    value: f64,
    tags: Tags,
}

/// Thread-safe in-memory raw point store
#[derive(Debug, Default)]
pub struct InMemoryPointStore {
    /// metric name -> points
    points: RwLock<HashMap<String, Vec<StoredPoint>>>,

    /// Pipelines executed so far
    queries: AtomicU64,
}

impl InMemoryPointStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one raw point
    pub fn insert(&self, point: DataPoint) {
        let DataPoint {
            metric,
            timestamp,
            value,
            tags,
        } = point;

        self.points
            .write()
            .entry(metric)
            .or_default()
            .push(StoredPoint {
                timestamp,
                value,
                tags,
            });
    }

    /// Append many raw points
    pub fn insert_many<I>(&self, points: I)
    where
        I: IntoIterator<Item = DataPoint>,
    {
        let mut inserted = 0usize;
        let mut guard = self.points.write();
        for point in points {
            guard.entry(point.metric).or_default().push(StoredPoint {
                timestamp: point.timestamp,
                value: point.value,
                tags: point.tags,
            });
            inserted += 1;
        }
        debug!(points = inserted, "Inserted points");
    }

    /// Number of points stored for a metric
    pub fn point_count(&self, metric: &str) -> usize {
        self.points.read().get(metric).map_or(0, Vec::len)
    }

    /// Number of pipelines executed since creation
    pub fn queries_executed(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BackingStore for InMemoryPointStore {
    fn store_id(&self) -> &str {
        "in-memory-points-v1"
    }

    async fn aggregate(
        &self,
        metric: &str,
        pipeline: &Pipeline,
    ) -> Result<Vec<GroupRow>, BackingStoreError> {
        self.queries.fetch_add(1, Ordering::Relaxed);

        let guard = self.points.read();
        let Some(points) = guard.get(metric) else {
            return Ok(Vec::new());
        };

        // Group key: (bucketed date, group tags). BTreeMap keeps output ordered.
        let mut groups: BTreeMap<(Option<Timestamp>, Tags), ReducerState> = BTreeMap::new();

        for point in points
            .iter()
            .filter(|p| pipeline.match_stage.matches(p.timestamp, &p.tags))
        {
            let date = match (&pipeline.bucket, pipeline.group.by_date) {
                (Some(bucket), true) => Some(bucket.bucket(point.timestamp)),
                (None, true) => Some(point.timestamp),
                (_, false) => None,
            };
            let tags: Tags = pipeline
                .group
                .tags
                .iter()
                .filter_map(|name| point.tags.get(name).map(|v| (name.clone(), v.clone())))
                .collect();

            groups.entry((date, tags)).or_default().add(point.value);
        }

        let grouped_by_tags = !pipeline.group.tags.is_empty();
        let rows = groups
            .into_iter()
            .filter_map(|((date, tags), state)| {
                state
                    .finalize(pipeline.group.reducer)
                    .map(|value| GroupRow {
                        date,
                        tags: grouped_by_tags.then_some(tags),
                        value,
                    })
            })
            .collect();

        Ok(rows)
    }
}
