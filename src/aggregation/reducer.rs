//! Aggregation functions
//!
//! A [`Reducer`] names the aggregation a request asks for. `sum`, `min` and
//! `max` are *reusable*: values reduced at a finer granularity can be reduced
//! again with the same function to get the coarser result. `avg` is not,
//! since an average of averages ignores how many points each one covered.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Aggregation function of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    /// Sum of all values
    Sum,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
    /// Average (mean) of all values
    Avg,
}

impl Reducer {
    /// All reducers, in declaration order
    pub const ALL: [Reducer; 4] = [Reducer::Sum, Reducer::Min, Reducer::Max, Reducer::Avg];

    /// Lowercase function name
    pub fn as_str(&self) -> &'static str {
        match self {
            Reducer::Sum => "sum",
            Reducer::Min => "min",
            Reducer::Max => "max",
            Reducer::Avg => "avg",
        }
    }

    /// Operator name in the backing store's group stage
    pub fn operator(&self) -> &'static str {
        match self {
            Reducer::Sum => "$sum",
            Reducer::Min => "$min",
            Reducer::Max => "$max",
            Reducer::Avg => "$avg",
        }
    }

    /// True when partial results can be recombined with the same function
    pub fn is_reusable(&self) -> bool {
        !matches!(self, Reducer::Avg)
    }

    /// Reduce a list of values, `None` when the list is empty
    pub fn reduce<I>(&self, values: I) -> Option<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut state = ReducerState::new();
        for value in values {
            state.add(value);
        }
        state.finalize(*self)
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reducer {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reducer::ALL
            .into_iter()
            .find(|reducer| reducer.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::UnknownFunction(s.to_string()))
    }
}

/// Running state for incremental reduction
#[derive(Debug, Clone)]
pub struct ReducerState {
    sum: f64,
    count: u64,
    min: f64,
    max: f64,
}

impl ReducerState {
    /// Create an empty state
    pub fn new() -> Self {
        Self {
            sum: 0.0,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Add one value
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    /// Merge another state into this one
    pub fn merge(&mut self, other: &ReducerState) {
        if other.count == 0 {
            return;
        }
        self.sum += other.sum;
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Number of values added
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Final value for the given reducer
    pub fn finalize(&self, reducer: Reducer) -> Option<f64> {
        if self.count == 0 {
            return None;
        }

        Some(match reducer {
            Reducer::Sum => self.sum,
            Reducer::Min => self.min,
            Reducer::Max => self.max,
            Reducer::Avg => self.sum / self.count as f64,
        })
    }
}

impl Default for ReducerState {
    fn default() -> Self {
        Self::new()
    }
}
