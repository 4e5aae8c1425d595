//! Backing store interface
//!
//! The backing store holds the raw points and executes aggregation
//! [`Pipeline`]s over them. The cache treats it as an opaque, read-only
//! collaborator: every call is an I/O boundary and may fail.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackingStoreError;
use crate::query::pipeline::Pipeline;
use crate::types::{Tags, Timestamp};

/// One grouped result of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRow {
    /// Bucket start, present when the pipeline bucketed by date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<Timestamp>,

    /// Tag combination, present when the pipeline grouped by tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,

    /// Reduced value of the group
    pub value: f64,
}

/// Raw point store able to execute aggregation pipelines
#[async_trait]
pub trait BackingStore: Send + Sync + 'static {
    /// Identifier of the store implementation, used in logs
    fn store_id(&self) -> &str;

    /// Run a pipeline against the points of `metric`
    ///
    /// An unknown metric yields no rows rather than an error.
    async fn aggregate(
        &self,
        metric: &str,
        pipeline: &Pipeline,
    ) -> Result<Vec<GroupRow>, BackingStoreError>;
}
