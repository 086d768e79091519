//! Offline snapshot cache for the restaurant collection.
//!
//! This module provides the network-first fetch strategy used by the data
//! access layer:
//! - Always try the network first
//! - Persist the first successful snapshot in the background (first write wins)
//! - Serve the stored snapshot when the network is unavailable

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{NoopStore, SnapshotStore, SqliteSnapshotStore};
pub use traits::{CacheSource, Cacheable};
