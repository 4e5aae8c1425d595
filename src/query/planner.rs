//! Worker Planner - turns window coverage into backing store work
//!
//! Consecutive empty windows are coalesced into one bulk worker so the
//! backing store answers the whole run with a single bucketed query. Every
//! window with any cached coverage gets its own partial worker.
//!
//! ```text
//! windows:  [full] [empty] [empty] [partial] [empty]
//!              │      └──────┬─────┘    │        │
//!              ▼             ▼          ▼        ▼
//! workers:  Partial        Bulk      Partial    Bulk
//! ```

use tracing::debug;

use crate::window::WindowSet;

use super::worker::{BulkWorker, PartialWorker, Worker};

/// Builds the worker list for a window set
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerPlanner;

impl WorkerPlanner {
    /// Create a planner
    pub fn new() -> Self {
        Self
    }

    /// Plan workers for `windows`, in window order
    pub fn plan(&self, windows: &WindowSet) -> Vec<Worker> {
        let mut workers = Vec::new();
        let mut run: Option<(i64, i64)> = None;

        for window in windows.windows() {
            if window.is_empty() {
                run = Some(match run {
                    Some((start, _)) => (start, window.stop()),
                    None => (window.start(), window.stop()),
                });
                continue;
            }

            if let Some((start, stop)) = run.take() {
                workers.push(Worker::Bulk(BulkWorker::new(start, stop, windows.step())));
            }
            workers.push(Worker::Partial(PartialWorker::new(window.clone())));
        }

        if let Some((start, stop)) = run {
            workers.push(Worker::Bulk(BulkWorker::new(start, stop, windows.step())));
        }

        debug!(
            windows = windows.len(),
            workers = workers.len(),
            "Planned workers"
        );
        workers
    }
}
