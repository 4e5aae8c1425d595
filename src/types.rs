//! Core data types shared across the cache
//!
//! # Key Types
//!
//! - **`DataPoint`**: A raw metric sample (metric name, timestamp, value, tags)
//! - **`Tags`**: Ordered tag name to tag value mapping
//! - **`TagFilter`**: Per-tag request filter, either an equality match or a group-by
//! - **`TagFilters`**: The full tag filter set of a request
//! - **`ResultRow`**: One aggregated output row keyed by window start
//!
//! # Example
//!
//! ```rust
//! use kuba_window_cache::types::{TagFilter, TagFilters};
//!
//! let filters = TagFilters::new()
//!     .with("host", TagFilter::Equals("server1".to_string()))
//!     .with("dc", TagFilter::GroupBy);
//!
//! assert!(filters.has_group_by());
//! assert_eq!(filters.equality_tags().get("host").map(String::as_str), Some("server1"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp unit used by the point store (integer, caller-defined resolution)
pub type Timestamp = i64;

/// Tag name to tag value mapping
///
/// A `BTreeMap` keeps iteration order stable, so two rows with the same tags
/// compare and hash identically regardless of how they were built.
pub type Tags = BTreeMap<String, String>;

/// Marker value that turns a tag filter into a group-by
pub const WILDCARD: &str = "*";

/// A single raw sample of a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Metric name the sample belongs to
    pub metric: String,

    /// Sample timestamp
    #[serde(alias = "date")]
    pub timestamp: Timestamp,

    /// Sample value
    pub value: f64,

    /// Optional dimensional tags
    #[serde(default)]
    pub tags: Tags,
}

impl DataPoint {
    /// Create an untagged data point
    pub fn new(metric: impl Into<String>, timestamp: Timestamp, value: f64) -> Self {
        Self {
            metric: metric.into(),
            timestamp,
            value,
            tags: Tags::new(),
        }
    }

    /// Attach a tag to the point
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }
}

/// Filter applied to one tag of a request
///
/// Serialized as a plain string: `"*"` is [`TagFilter::GroupBy`], anything
/// else is an equality match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TagFilter {
    /// Keep only points whose tag equals the value
    Equals(String),

    /// Keep every point and group the output by the tag's distinct values
    GroupBy,
}

impl TagFilter {
    /// Equality value, if this is an equality filter
    pub fn value(&self) -> Option<&str> {
        match self {
            TagFilter::Equals(value) => Some(value),
            TagFilter::GroupBy => None,
        }
    }
}

impl From<String> for TagFilter {
    fn from(value: String) -> Self {
        if value == WILDCARD {
            TagFilter::GroupBy
        } else {
            TagFilter::Equals(value)
        }
    }
}

impl From<&str> for TagFilter {
    fn from(value: &str) -> Self {
        TagFilter::from(value.to_string())
    }
}

impl From<TagFilter> for String {
    fn from(filter: TagFilter) -> Self {
        match filter {
            TagFilter::Equals(value) => value,
            TagFilter::GroupBy => WILDCARD.to_string(),
        }
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagFilter::Equals(value) => write!(f, "{}", value),
            TagFilter::GroupBy => write!(f, "{}", WILDCARD),
        }
    }
}

/// Tag filter set of a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagFilters {
    filters: BTreeMap<String, TagFilter>,
}

impl TagFilters {
    /// Create an empty filter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter, builder style
    pub fn with(mut self, name: impl Into<String>, filter: impl Into<TagFilter>) -> Self {
        self.insert(name, filter);
        self
    }

    /// Add or replace the filter for a tag
    pub fn insert(&mut self, name: impl Into<String>, filter: impl Into<TagFilter>) {
        self.filters.insert(name.into(), filter.into());
    }

    /// Number of filtered tags
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// True when the request carries no tags at all
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// True when any tag is a group-by
    ///
    /// The output shape of such a request depends on the data, so it can
    /// never be served from the cache.
    pub fn has_group_by(&self) -> bool {
        self.filters
            .values()
            .any(|filter| matches!(filter, TagFilter::GroupBy))
    }

    /// Tag names in the filter set, in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    /// Iterate over `(name, filter)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagFilter)> {
        self.filters.iter().map(|(name, filter)| (name.as_str(), filter))
    }

    /// Equality filters only, as a tag mapping
    pub fn equality_tags(&self) -> Tags {
        self.filters
            .iter()
            .filter_map(|(name, filter)| filter.value().map(|v| (name.clone(), v.to_string())))
            .collect()
    }

    /// Check whether a point's tags satisfy every equality filter
    pub fn matches(&self, tags: &Tags) -> bool {
        self.filters.iter().all(|(name, filter)| match filter {
            TagFilter::Equals(value) => tags.get(name) == Some(value),
            TagFilter::GroupBy => true,
        })
    }
}

impl<K: Into<String>, V: Into<TagFilter>> FromIterator<(K, V)> for TagFilters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = TagFilters::new();
        for (name, filter) in iter {
            filters.insert(name, filter);
        }
        filters
    }
}

/// One aggregated output row
///
/// `tags` is present only when the request carried tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    /// Start of the window this row aggregates
    pub window_start: Timestamp,

    /// Tag combination of the row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,

    /// Aggregated value
    pub value: f64,
}

impl ResultRow {
    /// Create an untagged row
    pub fn new(window_start: Timestamp, value: f64) -> Self {
        Self {
            window_start,
            tags: None,
            value,
        }
    }

    /// Attach a tag combination
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = Some(tags);
        self
    }
}
