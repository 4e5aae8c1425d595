//! Property tests for window partitioning and coverage tracking
//!
//! Uses property-based testing (proptest) to check that windows always
//! partition the query range and that covered and missing intervals always
//! partition each window.

use proptest::prelude::*;

use kuba_window_cache::window::{Interval, Window, WindowSet};

// =============================================================================
// Test Data Strategies
// =============================================================================

/// Query ranges with a step, kept small enough to build every window
fn range_and_step() -> impl Strategy<Value = (i64, i64, i64)> {
    (-10_000i64..10_000, 0i64..5_000, 1i64..500).prop_map(|(start, len, step)| {
        (start, start + len, step)
    })
}

/// Window bounds plus a list of cut points inside it
fn window_and_cuts() -> impl Strategy<Value = (i64, i64, Vec<i64>)> {
    (-1_000i64..1_000, 0i64..200).prop_flat_map(|(start, len)| {
        let stop = start + len;
        (
            Just(start),
            Just(stop),
            prop::collection::vec(start..=stop, 0..20),
        )
    })
}

/// Covered and missing intervals must tile the window exactly
fn assert_partition(window: &Window) {
    let mut all: Vec<Interval> = window
        .covered()
        .iter()
        .chain(window.missing().iter())
        .copied()
        .collect();
    all.sort_by_key(|i| i.start);

    assert_eq!(all.first().map(|i| i.start), Some(window.start()));
    assert_eq!(all.last().map(|i| i.stop), Some(window.stop()));
    for pair in all.windows(2) {
        assert_eq!(pair[0].stop + 1, pair[1].start);
    }
}

proptest! {
    #[test]
    fn prop_windows_partition_range((start, stop, step) in range_and_step()) {
        let set = WindowSet::new(start, stop, step).unwrap();
        let windows = set.windows();

        prop_assert_eq!(windows.first().map(|w| w.start()), Some(start));
        prop_assert_eq!(windows.last().map(|w| w.stop()), Some(stop));
        prop_assert_eq!(windows.len() as u64, WindowSet::window_count(start, stop, step).unwrap());

        for pair in windows.windows(2) {
            prop_assert_eq!(pair[0].stop() + 1, pair[1].start());
        }
        for window in windows {
            prop_assert!(window.span() <= step as u64);
        }
        // Interior windows are aligned and full
        if windows.len() > 2 {
            for window in &windows[1..windows.len() - 1] {
                prop_assert_eq!(window.start().rem_euclid(step), 0);
                prop_assert_eq!(window.span(), step as u64);
            }
        }
    }

    #[test]
    fn prop_coverage_partitions_window((start, stop, cuts) in window_and_cuts()) {
        let mut window = Window::new(start, stop);
        assert_partition(&window);

        // Cover single points at each cut; repeats must be rejected
        for cut in cuts {
            let already = window.covered().iter().any(|i| i.contains_timestamp(cut));
            let result = window.add_covered(Interval::with_value(cut, cut, 1.0));
            prop_assert_eq!(result.is_err(), already);
            assert_partition(&window);
        }
    }

    #[test]
    fn prop_covering_all_missing_leaves_nothing((start, stop, cuts) in window_and_cuts()) {
        let mut window = Window::new(start, stop);
        for cut in cuts {
            let _ = window.add_covered(Interval::new(cut, cut));
        }

        let missing: Vec<Interval> = window.missing().to_vec();
        for interval in missing {
            window.add_covered(interval).unwrap();
        }

        prop_assert!(window.missing().is_empty());
        prop_assert!(window.is_full());
        assert_partition(&window);
    }
}
