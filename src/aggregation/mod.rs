//! Aggregation functions
//!
//! [`Reducer`] names the function a request applies to each window and
//! [`ReducerState`] accumulates values for it incrementally.

pub mod reducer;

pub use reducer::{Reducer, ReducerState};
