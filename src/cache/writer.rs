//! Cache writer
//!
//! Persists the rows produced for a request so later requests can reuse
//! them. Only rows for aligned, full-span windows are written, since a
//! cache entry always claims `[window_start, window_start + step - 1]`.

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::aggregation::Reducer;
use crate::types::{ResultRow, Tags};
use crate::window::{Window, WindowSet};

use super::store::{CacheEntry, CacheStore};

/// Outcome of one write-back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Entries persisted
    pub written: usize,
    /// Rows not eligible for caching
    pub skipped: usize,
    /// Inserts rejected by the store
    pub failed: usize,
}

/// Writes request results back to a cache store
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheWriter;

impl CacheWriter {
    /// Create a writer
    pub fn new() -> Self {
        Self
    }

    /// Convert the cacheable rows into entries stamped with the current time
    ///
    /// Rows whose window is shortened by the query bounds are dropped, as are
    /// rows for windows already answered by a single entry at this step.
    pub fn entries(
        &self,
        metric: &str,
        function: Reducer,
        tags: &Tags,
        windows: &WindowSet,
        rows: &[ResultRow],
    ) -> Vec<CacheEntry> {
        let write_time = Utc::now();

        rows.iter()
            .filter(|row| windows.is_full_span(row.window_start))
            .filter(|row| match windows.window_at(row.window_start) {
                Some(window) => !answered_by_single_entry(window),
                None => false,
            })
            .map(|row| CacheEntry {
                metric: metric.to_string(),
                window_start: row.window_start,
                step: windows.step(),
                function,
                tags: tags.clone(),
                value: row.value,
                write_time,
            })
            .collect()
    }

    /// Persist cacheable rows
    ///
    /// Insert failures are logged and counted; they never fail the request.
    pub async fn write(
        &self,
        cache: &dyn CacheStore,
        metric: &str,
        function: Reducer,
        tags: &Tags,
        windows: &WindowSet,
        rows: &[ResultRow],
    ) -> WriteReport {
        let entries = self.entries(metric, function, tags, windows, rows);
        let mut report = WriteReport {
            skipped: rows.len() - entries.len(),
            ..WriteReport::default()
        };

        let results = join_all(entries.into_iter().map(|entry| cache.insert(entry))).await;
        for result in results {
            match result {
                Ok(()) => report.written += 1,
                Err(e) => {
                    warn!(store = cache.store_id(), metric, error = %e, "Cache write failed");
                    report.failed += 1;
                }
            }
        }

        debug!(
            metric,
            written = report.written,
            skipped = report.skipped,
            failed = report.failed,
            "Cache write-back complete"
        );
        report
    }
}

fn answered_by_single_entry(window: &Window) -> bool {
    matches!(window.covered(), [only] if only.start == window.start() && only.stop == window.stop())
}
