//! Backing store access
//!
//! The backing store holds raw points and evaluates aggregation pipelines.
//! [`BackingStore`] is the seam to a real database; [`InMemoryPointStore`]
//! evaluates pipelines over points held in memory.

pub mod backend;
pub mod memory;

pub use backend::{BackingStore, GroupRow};
pub use memory::InMemoryPointStore;
