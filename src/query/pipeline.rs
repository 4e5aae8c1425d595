//! Pipeline Generator - backing store aggregation descriptions
//!
//! Every backing store query issued by a worker is described by a
//! [`Pipeline`] of three stages:
//!
//! ```text
//! ┌───────────┐     ┌────────────────────┐     ┌──────────────────────┐
//! │  match    │ ──▶ │  bucket (optional) │ ──▶ │  group               │
//! │ date∈[a,b]│     │ date - date % step │     │ reduce value by      │
//! │ tag = v   │     │ pass value, tags   │     │ (date?, filter tags) │
//! └───────────┘     └────────────────────┘     └──────────────────────┘
//! ```
//!
//! The bucket stage is left out for single-interval queries, which must
//! return exactly one pre-reduced value per tag combination.

use serde_json::{json, Map, Value};

use crate::aggregation::Reducer;
use crate::types::{TagFilters, Tags, Timestamp};
use crate::window::Interval;

/// Filter points by date range and tag equality
#[derive(Debug, Clone, PartialEq)]
pub struct MatchStage {
    /// First timestamp (inclusive)
    pub start: Timestamp,
    /// Last timestamp (inclusive)
    pub stop: Timestamp,
    /// Equality filters, one per non-wildcard tag
    pub tags: Tags,
}

impl MatchStage {
    /// True when a point with this timestamp and these tags passes the stage
    pub fn matches(&self, timestamp: Timestamp, tags: &Tags) -> bool {
        self.start <= timestamp
            && timestamp <= self.stop
            && self.tags.iter().all(|(name, value)| tags.get(name) == Some(value))
    }
}

/// Project each point's date onto the start of its step bucket
#[derive(Debug, Clone, PartialEq)]
pub struct BucketStage {
    /// Bucket width
    pub step: i64,
    /// Tags passed through to the group stage
    pub tags: Vec<String>,
}

impl BucketStage {
    /// Bucket start of a timestamp
    pub fn bucket(&self, timestamp: Timestamp) -> Timestamp {
        timestamp - timestamp.rem_euclid(self.step)
    }
}

/// Reduce values grouped by bucket date and tags
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStage {
    /// Aggregation function
    pub reducer: Reducer,
    /// Group by the bucketed date
    pub by_date: bool,
    /// Tags that take part in the group key
    pub tags: Vec<String>,
}

/// Aggregation query for the backing store
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    /// Match stage
    pub match_stage: MatchStage,
    /// Bucket stage, absent for single-interval queries
    pub bucket: Option<BucketStage>,
    /// Group stage
    pub group: GroupStage,
}

impl Pipeline {
    /// Render as the backing store's JSON aggregation document
    pub fn to_document(&self) -> Value {
        let mut match_doc = Map::new();
        match_doc.insert(
            "date".to_string(),
            json!({ "$gte": self.match_stage.start, "$lte": self.match_stage.stop }),
        );
        for (name, value) in &self.match_stage.tags {
            match_doc.insert(format!("tags.{}", name), json!(value));
        }

        let mut project = Map::new();
        project.insert("value".to_string(), json!(1));
        if let Some(bucket) = &self.bucket {
            project.insert(
                "date".to_string(),
                json!({ "$subtract": ["$date", { "$mod": ["$date", bucket.step] }] }),
            );
        }
        for name in &self.group.tags {
            project.insert(format!("tags.{}", name), json!(1));
        }

        let mut id = Map::new();
        if self.group.by_date {
            id.insert("date".to_string(), json!("$date"));
        }
        if !self.group.tags.is_empty() {
            let tags: Map<String, Value> = self
                .group
                .tags
                .iter()
                .map(|name| (name.clone(), json!(format!("$tags.{}", name))))
                .collect();
            id.insert("tags".to_string(), Value::Object(tags));
        }
        let id = if id.is_empty() {
            Value::Null
        } else {
            Value::Object(id)
        };

        let mut reduction = Map::new();
        reduction.insert(self.group.reducer.operator().to_string(), json!("$value"));

        json!([
            { "$match": match_doc },
            { "$project": project },
            { "$group": { "_id": id, "value": reduction } },
        ])
    }
}

/// Builds pipelines from request parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineGenerator;

impl PipelineGenerator {
    /// Build a pipeline over `[start, stop]`, bucketed by `step` when given
    pub fn generate(
        start: Timestamp,
        stop: Timestamp,
        step: Option<i64>,
        reducer: Reducer,
        filters: &TagFilters,
    ) -> Pipeline {
        let tags: Vec<String> = filters.names().map(str::to_string).collect();

        Pipeline {
            match_stage: MatchStage {
                start,
                stop,
                tags: filters.equality_tags(),
            },
            bucket: step.map(|step| BucketStage {
                step,
                tags: tags.clone(),
            }),
            group: GroupStage {
                reducer,
                by_date: step.is_some(),
                tags,
            },
        }
    }

    /// Bucketed pipeline over a run of windows
    pub fn bucketed(
        start: Timestamp,
        stop: Timestamp,
        step: i64,
        reducer: Reducer,
        filters: &TagFilters,
    ) -> Pipeline {
        Self::generate(start, stop, Some(step), reducer, filters)
    }

    /// Unbucketed pipeline over a single interval
    pub fn single(interval: &Interval, reducer: Reducer, filters: &TagFilters) -> Pipeline {
        Self::generate(interval.start, interval.stop, None, reducer, filters)
    }
}
