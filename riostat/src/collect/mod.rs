//! Cluster usage collection.
//!
//! [`source`] runs the report command and [`snapshot`] decodes what it prints.

pub mod snapshot;
pub mod source;

pub use snapshot::{ClusterStats, PoolStats, SnapshotError};
pub use source::{CommandSource, SnapshotSource, SourceError};
