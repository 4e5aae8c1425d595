//! Error types for the window cache

use std::time::Duration;
use thiserror::Error;

/// Main error type for the window cache
#[derive(Error, Debug)]
pub enum Error {
    /// Request string could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Request parameters are out of bounds
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Cached interval did not fit the window coverage
    #[error("Coverage error: {0}")]
    Coverage(#[from] CoverageError),

    /// Backing store call failed
    #[error("Backing store error: {0}")]
    BackingStore(#[from] BackingStoreError),

    /// Cache store call failed
    #[error("Cache store error: {0}")]
    CacheStore(#[from] CacheStoreError),

    /// Worker execution exceeded the configured deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Request string parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Function name is not one of sum, min, max, avg
    #[error("Unknown aggregation function: {0}")]
    UnknownFunction(String),

    /// Request is not of the form `<function>(<metric>)`
    #[error("Malformed request '{0}', expected <function>(<metric>)")]
    Malformed(String),

    /// Metric name between the parentheses is empty
    #[error("Metric name is empty")]
    EmptyMetric,
}

/// Request parameter validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Step must be a positive integer
    #[error("Step must be positive, got {0}")]
    InvalidStep(i64),

    /// Query bounds are inverted
    #[error("Invalid time range: start {start} > stop {stop}")]
    InvalidRange {
        /// Requested start (inclusive)
        start: i64,
        /// Requested stop (inclusive)
        stop: i64,
    },

    /// Query would produce more windows than allowed
    #[error("Query spans {count} windows, limit is {limit}")]
    TooManyWindows {
        /// Number of windows the query needs
        count: u64,
        /// Configured maximum
        limit: u64,
    },
}

/// Coverage bookkeeping errors
///
/// Raised when a cached interval cannot be recorded in a window. The cache
/// loader recovers from these by skipping the offending entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoverageError {
    /// Interval has start > stop
    #[error("Invalid interval [{start}, {stop}]")]
    InvalidInterval {
        /// Interval start
        start: i64,
        /// Interval stop
        stop: i64,
    },

    /// No open missing interval contains the inserted interval
    #[error("Interval [{start}, {stop}] is not contained in any missing interval")]
    NotContained {
        /// Interval start
        start: i64,
        /// Interval stop
        stop: i64,
    },

    /// Interval does not start inside any window of the set
    #[error("Interval [{start}, {stop}] lies outside the window set")]
    OutsideWindowSet {
        /// Interval start
        start: i64,
        /// Interval stop
        stop: i64,
    },
}

/// Backing store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackingStoreError {
    /// Aggregation pipeline execution failed
    #[error("Query failed: {0}")]
    Query(String),

    /// Backing store could not be reached
    #[error("Backing store unavailable: {0}")]
    Unavailable(String),
}

/// Cache store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheStoreError {
    /// Lookup failed
    #[error("Cache read failed: {0}")]
    Read(String),

    /// Insert failed
    #[error("Cache write failed: {0}")]
    Write(String),

    /// Store is at capacity
    #[error("Cache capacity exceeded: limit is {limit} entries")]
    CapacityExceeded {
        /// Maximum number of live entries
        limit: usize,
    },
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err: Error = ParseError::UnknownFunction("median".to_string()).into();
        assert!(err.to_string().contains("median"));

        let err: Error = ValidationError::InvalidRange { start: 10, stop: 5 }.into();
        assert!(err.to_string().contains("start 10 > stop 5"));
    }

    #[test]
    fn test_coverage_error_conversion() {
        let err: Error = CoverageError::NotContained { start: 2, stop: 6 }.into();
        assert!(matches!(err, Error::Coverage(CoverageError::NotContained { .. })));
    }
}
