//! Request model and parsing
//!
//! A request names its aggregation as a call expression, for example
//! `sum(cpu.load)`, together with the time range, window step and tag
//! filters:
//!
//! ```json
//! {"request": "sum(sample)", "start": 0, "stop": 19, "step": 10, "tags": {"host": "*"}}
//! ```

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    sequence::{delimited, preceded},
    IResult, Parser,
};
use serde::{Deserialize, Serialize};

use crate::aggregation::Reducer;
use crate::error::{ParseError, Result, ValidationError};
use crate::types::{TagFilters, Timestamp};

// ============================================================================
// Wire Request
// ============================================================================

/// Request as submitted by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Call expression `<function>(<metric>)`
    pub request: String,

    /// Range start (inclusive)
    pub start: Timestamp,

    /// Range stop (inclusive)
    pub stop: Timestamp,

    /// Window span
    pub step: i64,

    /// Tag filters; `"*"` groups by the tag
    #[serde(default)]
    pub tags: TagFilters,
}

impl QueryRequest {
    /// Create a request without tag filters
    pub fn new(request: impl Into<String>, start: Timestamp, stop: Timestamp, step: i64) -> Self {
        Self {
            request: request.into(),
            start,
            stop,
            step,
            tags: TagFilters::new(),
        }
    }

    /// Add a tag filter
    pub fn with_tag(mut self, name: impl Into<String>, filter: impl Into<String>) -> Self {
        self.tags.insert(name, filter.into());
        self
    }
}

// ============================================================================
// Parsed Request
// ============================================================================

/// Validated request ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationQuery {
    /// Aggregation function
    pub reducer: Reducer,
    /// Metric name
    pub metric: String,
    /// Range start (inclusive)
    pub start: Timestamp,
    /// Range stop (inclusive)
    pub stop: Timestamp,
    /// Window span
    pub step: i64,
    /// Tag filters
    pub filters: TagFilters,
}

impl AggregationQuery {
    /// Parse and validate a wire request
    pub fn from_request(request: &QueryRequest) -> Result<Self> {
        let (reducer, metric) = parse_request_call(&request.request)?;

        if request.step <= 0 {
            return Err(ValidationError::InvalidStep(request.step).into());
        }
        if request.start > request.stop {
            return Err(ValidationError::InvalidRange {
                start: request.start,
                stop: request.stop,
            }
            .into());
        }

        Ok(Self {
            reducer,
            metric,
            start: request.start,
            stop: request.stop,
            step: request.step,
            filters: request.tags.clone(),
        })
    }

    /// True when results may be read from and written to the cache
    ///
    /// Averages cannot be recombined from partial results, and group-by
    /// requests produce a data-dependent set of tag combinations.
    pub fn is_cacheable(&self) -> bool {
        self.reducer.is_reusable() && !self.filters.has_group_by()
    }
}

// ============================================================================
// Call Expression Parser
// ============================================================================

/// Parse `<function>(<metric>)` into its reducer and metric name
///
/// Whitespace around the tokens is ignored and the function name is
/// matched case-insensitively.
pub fn parse_request_call(input: &str) -> std::result::Result<(Reducer, String), ParseError> {
    let (remaining, (function, metric)) =
        call_expression(input).map_err(|_| malformed_or_empty(input))?;

    if !remaining.trim().is_empty() {
        return Err(ParseError::Malformed(input.to_string()));
    }

    let reducer: Reducer = function.parse()?;
    Ok((reducer, metric.to_string()))
}

fn call_expression(input: &str) -> IResult<&str, (&str, &str)> {
    (
        preceded(multispace0, identifier),
        delimited(
            (multispace0, char('('), multispace0),
            metric_name,
            (multispace0, char(')'), multispace0),
        ),
    )
        .parse(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphabetic()).parse(input)
}

fn metric_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')).parse(input)
}

/// Distinguish `sum()` from other syntax errors
fn malformed_or_empty(input: &str) -> ParseError {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.ends_with("()") && compact.len() > 2 {
        ParseError::EmptyMetric
    } else {
        ParseError::Malformed(input.to_string())
    }
}
