//! Snapshot-backed Census source.
//!
//! The snapshot backend stands in for the remote Census: it owns value-filter
//! evaluation and row-limit push-down for data loaded from disk.

pub mod expr;
pub mod snapshot;

pub use snapshot::{SnapshotCensus, SnapshotSource};
