//! Per-pool I/O rates for a RADOS cluster.
//!
//! `riostat` samples `rados df -f json` at a fixed interval and prints how
//! fast each pool is being read, written and grown, in the spirit of
//! `iostat`.
//!
//! ## Modules
//!
//! - [`collect`]: running the report command and decoding its output
//! - [`store`]: the two-slot current/previous snapshot store
//! - [`delta`]: per-pool rates between two snapshots
//! - [`render`]: the fixed-width rate table
//! - [`sampler`]: the fixed-interval sampling loop
//! - [`config`]: interval and environment overrides

#![deny(unsafe_code)]

pub mod collect;
pub mod config;
pub mod delta;
pub mod render;
pub mod sampler;
pub mod store;

pub use collect::{
    ClusterStats, CommandSource, PoolStats, SnapshotError, SnapshotSource, SourceError,
};
pub use config::{ConfigError, DEFAULT_INTERVAL, SamplerConfig, interval_from_cli};
pub use delta::{PoolRates, compute_rates};
pub use render::render_table;
pub use riostat_common::{LogConfig, init_logging};
pub use sampler::{CycleReport, Sampler, SamplerError, SamplerState};
pub use store::SnapshotStore;
