//! A single window of a query range and its coverage
//!
//! Every window starts fully missing. Cached intervals are inserted one at a
//! time; each insertion splits the missing interval that contains it, so the
//! covered and missing lists always partition the window span exactly.
//!
//! ```text
//! window [0, 7], insert [2, 6]
//!
//!   0 1 2 3 4 5 6 7
//!   - - # # # # # -      covered: [2, 6]
//!                        missing: [0, 1], [7, 7]
//! ```

use crate::error::CoverageError;
use crate::types::Timestamp;

use super::interval::Interval;

/// Coverage state of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// No cached interval at all
    Empty,
    /// Some cached intervals, some missing
    Partial,
    /// Nothing left to compute
    Full,
}

/// One bucket of a query range
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    start: Timestamp,
    stop: Timestamp,
    /// Covered intervals ordered by start
    covered: Vec<Interval>,
    /// Missing intervals ordered by start
    missing: Vec<Interval>,
}

impl Window {
    /// Create a fully missing window spanning `[start, stop]`
    pub fn new(start: Timestamp, stop: Timestamp) -> Self {
        debug_assert!(start <= stop);
        Self {
            start,
            stop,
            covered: Vec::new(),
            missing: vec![Interval::new(start, stop)],
        }
    }

    /// First timestamp of the window
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Last timestamp of the window
    pub fn stop(&self) -> Timestamp {
        self.stop
    }

    /// Window bounds as an interval
    pub fn bounds(&self) -> Interval {
        Interval::new(self.start, self.stop)
    }

    /// Number of timestamps in the window
    pub fn span(&self) -> u64 {
        self.bounds().len()
    }

    /// Covered intervals, ordered by start
    pub fn covered(&self) -> &[Interval] {
        &self.covered
    }

    /// Missing intervals, ordered by start
    pub fn missing(&self) -> &[Interval] {
        &self.missing
    }

    /// Current coverage state
    pub fn coverage(&self) -> Coverage {
        match (self.covered.is_empty(), self.missing.is_empty()) {
            (true, _) => Coverage::Empty,
            (false, true) => Coverage::Full,
            (false, false) => Coverage::Partial,
        }
    }

    /// True when no cached interval has been recorded
    pub fn is_empty(&self) -> bool {
        self.coverage() == Coverage::Empty
    }

    /// True when no missing interval remains
    pub fn is_full(&self) -> bool {
        self.coverage() == Coverage::Full
    }

    /// True when the window is neither empty nor full
    pub fn is_partial(&self) -> bool {
        self.coverage() == Coverage::Partial
    }

    /// Values carried by covered intervals
    pub fn covered_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.covered.iter().filter_map(|interval| interval.value)
    }

    /// Record a covered interval
    ///
    /// The interval must lie inside exactly one of the current missing
    /// intervals. That missing interval is replaced by the residual fragments
    /// on either side of the inserted interval (zero, one or two of them).
    pub fn add_covered(&mut self, interval: Interval) -> Result<(), CoverageError> {
        if !interval.is_valid() {
            return Err(CoverageError::InvalidInterval {
                start: interval.start,
                stop: interval.stop,
            });
        }

        let position = self
            .missing
            .iter()
            .position(|missing| missing.contains(&interval))
            .ok_or(CoverageError::NotContained {
                start: interval.start,
                stop: interval.stop,
            })?;

        // Rebuild the missing list with the matched interval swapped for its residuals
        let residuals = self.missing[position].residuals(&interval);
        self.missing = self.missing[..position]
            .iter()
            .copied()
            .chain(residuals)
            .chain(self.missing[position + 1..].iter().copied())
            .collect();

        let at = self.covered.partition_point(|c| c.start < interval.start);
        self.covered.insert(at, interval);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Window {
        Window::new(0, 8)
    }

    #[test]
    fn test_instantiation() {
        let w = window();
        assert!(w.is_empty());
        assert!(!w.is_partial());
        assert!(!w.is_full());
        assert_eq!(w.missing(), &[Interval::new(0, 8)]);
        assert_eq!(w.span(), 9);
    }

    #[test]
    fn test_cover_beginning() {
        let mut w = window();
        w.add_covered(Interval::with_value(0, 3, 42.0)).unwrap();

        assert!(w.is_partial());
        assert_eq!(w.missing(), &[Interval::new(4, 8)]);
    }

    #[test]
    fn test_cover_end() {
        let mut w = window();
        w.add_covered(Interval::with_value(4, 8, 42.0)).unwrap();

        assert!(w.is_partial());
        assert_eq!(w.missing(), &[Interval::new(0, 3)]);
    }

    #[test]
    fn test_cover_middle() {
        let mut w = Window::new(0, 7);
        w.add_covered(Interval::with_value(2, 6, 42.0)).unwrap();

        assert!(w.is_partial());
        assert_eq!(w.missing(), &[Interval::new(0, 1), Interval::new(7, 7)]);
    }

    #[test]
    fn test_cover_full() {
        let mut w = window();
        w.add_covered(Interval::with_value(0, 8, 42.0)).unwrap();

        assert!(w.is_full());
        assert!(w.missing().is_empty());
        assert_eq!(w.covered_values().collect::<Vec<_>>(), vec![42.0]);
    }

    #[test]
    fn test_cover_full_with_two_intervals() {
        let mut w = window();
        w.add_covered(Interval::with_value(4, 8, 2.0)).unwrap();
        w.add_covered(Interval::with_value(0, 3, 1.0)).unwrap();

        assert!(w.is_full());
        // Covered list stays ordered by start
        assert_eq!(w.covered()[0].start, 0);
        assert_eq!(w.covered()[1].start, 4);
    }

    #[test]
    fn test_missing_order_preserved() {
        let mut w = Window::new(0, 19);
        w.add_covered(Interval::with_value(5, 9, 1.0)).unwrap();
        w.add_covered(Interval::with_value(12, 13, 1.0)).unwrap();

        assert_eq!(
            w.missing(),
            &[Interval::new(0, 4), Interval::new(10, 11), Interval::new(14, 19)]
        );
    }

    #[test]
    fn test_overlapping_insert_rejected() {
        let mut w = window();
        w.add_covered(Interval::with_value(2, 5, 1.0)).unwrap();

        let err = w.add_covered(Interval::with_value(4, 7, 1.0)).unwrap_err();
        assert_eq!(err, CoverageError::NotContained { start: 4, stop: 7 });

        // Failed insert leaves the window untouched
        assert_eq!(w.covered().len(), 1);
        assert_eq!(w.missing(), &[Interval::new(0, 1), Interval::new(6, 8)]);
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let mut w = window();
        let err = w.add_covered(Interval::new(5, 2)).unwrap_err();
        assert!(matches!(err, CoverageError::InvalidInterval { .. }));
        assert!(w.is_empty());
    }

    #[test]
    fn test_outside_window_rejected() {
        let mut w = window();
        assert!(w.add_covered(Interval::with_value(6, 12, 1.0)).is_err());
    }
}
