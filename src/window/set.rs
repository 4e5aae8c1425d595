//! Partitioning of a query range into step-aligned windows
//!
//! Interior windows are aligned to multiples of `step` and span exactly
//! `step` timestamps. When the query bounds are not aligned, the first and/or
//! last window is shortened so that the windows cover `[start, stop]` exactly.
//!
//! ```text
//! start = 3, stop = 24, step = 10
//!
//!   [3 ........ 9][10 ....... 19][20 .. 24]
//!    short first    interior      short last
//! ```

use crate::error::{CoverageError, ValidationError};
use crate::types::Timestamp;

use super::interval::Interval;
use super::range::Window;

/// Ordered, contiguous windows covering a query range
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSet {
    start: Timestamp,
    stop: Timestamp,
    step: i64,
    windows: Vec<Window>,
}

impl WindowSet {
    /// Partition `[start, stop]` into windows of `step`
    pub fn new(start: Timestamp, stop: Timestamp, step: i64) -> Result<Self, ValidationError> {
        Self::with_limit(start, stop, step, u64::MAX)
    }

    /// Partition `[start, stop]`, refusing to build more than `max_windows`
    pub fn with_limit(
        start: Timestamp,
        stop: Timestamp,
        step: i64,
        max_windows: u64,
    ) -> Result<Self, ValidationError> {
        let count = Self::window_count(start, stop, step)?;
        if count > max_windows {
            return Err(ValidationError::TooManyWindows {
                count,
                limit: max_windows,
            });
        }

        let mut windows = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
        let mut cursor = start;
        loop {
            // Distance to the next aligned boundary, minus one
            let remaining = step - 1 - cursor.rem_euclid(step);
            let end = cursor.saturating_add(remaining).min(stop);
            windows.push(Window::new(cursor, end));

            if end >= stop {
                break;
            }
            cursor = end + 1;
        }

        Ok(Self {
            start,
            stop,
            step,
            windows,
        })
    }

    /// Number of windows `[start, stop]` splits into, without building them
    pub fn window_count(
        start: Timestamp,
        stop: Timestamp,
        step: i64,
    ) -> Result<u64, ValidationError> {
        if step <= 0 {
            return Err(ValidationError::InvalidStep(step));
        }
        if start > stop {
            return Err(ValidationError::InvalidRange { start, stop });
        }

        let buckets = i128::from(stop.div_euclid(step)) - i128::from(start.div_euclid(step)) + 1;
        Ok(u64::try_from(buckets).unwrap_or(u64::MAX))
    }

    /// Query start (inclusive)
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Query stop (inclusive)
    pub fn stop(&self) -> Timestamp {
        self.stop
    }

    /// Window span
    pub fn step(&self) -> i64 {
        self.step
    }

    /// Windows ordered by start
    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    /// Number of windows
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Always false: a valid range yields at least one window
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Every missing interval of every window, in order
    pub fn missing_intervals(&self) -> impl Iterator<Item = &Interval> {
        self.windows.iter().flat_map(|window| window.missing().iter())
    }

    /// Window containing the timestamp
    pub fn window_at(&self, timestamp: Timestamp) -> Option<&Window> {
        self.index_of(timestamp).map(|idx| &self.windows[idx])
    }

    /// True when the window starting at `start` is aligned and spans a full step
    ///
    /// Only such windows can be described by a cache entry, which always
    /// claims `[window_start, window_start + step - 1]`.
    pub fn is_full_span(&self, start: Timestamp) -> bool {
        match self.window_at(start) {
            Some(window) => {
                window.start() == start
                    && start.rem_euclid(self.step) == 0
                    && window.span() == self.step as u64
            }
            None => false,
        }
    }

    /// Record a covered interval in the window that contains its start
    pub fn add_covered(&mut self, interval: Interval) -> Result<(), CoverageError> {
        let idx = self
            .index_of(interval.start)
            .ok_or(CoverageError::OutsideWindowSet {
                start: interval.start,
                stop: interval.stop,
            })?;

        self.windows[idx].add_covered(interval)
    }

    fn index_of(&self, timestamp: Timestamp) -> Option<usize> {
        let idx = self.windows.partition_point(|w| w.stop() < timestamp);
        match self.windows.get(idx) {
            Some(window) if window.start() <= timestamp => Some(idx),
            _ => None,
        }
    }
}
