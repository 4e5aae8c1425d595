//! Time-window partitioning and coverage tracking
//!
//! - [`Interval`]: inclusive `[start, stop]` range with an optional value
//! - [`Window`]: one bucket of the query range, split into covered and missing intervals
//! - [`WindowSet`]: the ordered windows of a whole query range

pub mod interval;
pub mod range;
pub mod set;

pub use interval::Interval;
pub use range::{Coverage, Window};
pub use set::WindowSet;
