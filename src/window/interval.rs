//! Inclusive time intervals
//!
//! An [`Interval`] is the unit of coverage bookkeeping: a window is split
//! into covered intervals (which carry a value read from the cache) and
//! missing intervals (which still need to be computed from raw points).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Timestamp;

/// Inclusive `[start, stop]` range, optionally carrying a computed value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// First timestamp of the interval (inclusive)
    pub start: Timestamp,

    /// Last timestamp of the interval (inclusive)
    pub stop: Timestamp,

    /// Aggregated value of the interval, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Interval {
    /// Create an interval with no value
    pub fn new(start: Timestamp, stop: Timestamp) -> Self {
        Self {
            start,
            stop,
            value: None,
        }
    }

    /// Create an interval carrying a value
    pub fn with_value(start: Timestamp, stop: Timestamp, value: f64) -> Self {
        Self {
            start,
            stop,
            value: Some(value),
        }
    }

    /// True when `start <= stop`
    pub fn is_valid(&self) -> bool {
        self.start <= self.stop
    }

    /// True when `other` lies entirely inside this interval
    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.stop <= self.stop
    }

    /// True when the timestamp lies inside this interval
    pub fn contains_timestamp(&self, timestamp: Timestamp) -> bool {
        self.start <= timestamp && timestamp <= self.stop
    }

    /// Number of timestamps covered, saturating on overflow
    pub fn len(&self) -> u64 {
        self.stop.abs_diff(self.start).saturating_add(1)
    }

    /// Intervals are never empty; present for clippy's `len_without_is_empty`
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Split this interval around `inner`, returning the 0, 1 or 2 residual
    /// fragments left uncovered, in ascending order
    ///
    /// `inner` must be contained in `self`.
    pub(crate) fn residuals(&self, inner: &Interval) -> Vec<Interval> {
        debug_assert!(self.contains(inner));

        let mut fragments = Vec::with_capacity(2);
        if inner.start > self.start {
            fragments.push(Interval::new(self.start, inner.start - 1));
        }
        if inner.stop < self.stop {
            fragments.push(Interval::new(inner.stop + 1, self.stop));
        }
        fragments
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(value) => write!(f, "[{}, {}]={}", self.start, self.stop, value),
            None => write!(f, "[{}, {}]", self.start, self.stop),
        }
    }
}
