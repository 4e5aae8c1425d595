//! Window aggregate cache
//!
//! Stores per-window aggregates so that later requests over overlapping
//! ranges only compute what is not already known.
//!
//! # Flow
//!
//! ```text
//! ┌──────────────┐   find    ┌──────────────┐  add_covered  ┌──────────────┐
//! │  CacheStore  │ ────────► │ CacheLoader  │ ────────────► │  WindowSet   │
//! └──────────────┘           └──────────────┘               └──────────────┘
//!        ▲                                                         │
//!        │ insert            ┌──────────────┐     rows             │ plan
//!        └────────────────── │ CacheWriter  │ ◄──────────── workers┘
//!                            └──────────────┘
//! ```
//!
//! Entries are scoped by metric, aggregation function, step and the
//! equality tags of the request that produced them. Entries at finer steps
//! that evenly divide a request's step are reused to fill windows no
//! coarser entry answers.

pub mod loader;
pub mod memory;
pub mod store;
pub mod writer;

pub use loader::{compatible_steps, CacheLoader, LoadReport, DEFAULT_STEP_DIVISORS};
pub use memory::InMemoryCacheStore;
pub use store::{sort_entries, CacheEntry, CacheQuery, CacheStore};
pub use writer::{CacheWriter, WriteReport};
