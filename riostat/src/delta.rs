//! Per-pool rates derived from two consecutive snapshots.
//!
//! Rates are integer per-second values. Byte counters are converted to whole
//! MiB before dividing by the interval, so a pool moving less than one MiB
//! per interval reports 0.

use crate::collect::{ClusterStats, PoolStats};
use std::collections::HashMap;
use std::num::NonZeroU64;
use tracing::{debug, warn};

pub const MIB: u64 = 1_048_576;

/// One table row: per-second rates for a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolRates {
    pub name: String,
    pub write_ops: u64,
    pub write_mib: u64,
    pub read_ops: u64,
    pub read_mib: u64,
    /// Net objects created per second; 0 when the pool shrank.
    pub objects: u64,
    /// Net stored MiB added per second; 0 when the pool shrank.
    pub size_mib: u64,
    /// A traffic counter went backwards (daemon restart or counter reset) and
    /// its delta was clamped to zero.
    pub counter_reset: bool,
}

impl PoolRates {
    /// Rates for a single pool over `interval_secs`.
    ///
    /// `interval_secs` is the configured sampling interval, not the measured
    /// time between the two snapshots.
    pub fn from_delta(prev: &PoolStats, curr: &PoolStats, interval_secs: NonZeroU64) -> Self {
        let t = interval_secs.get();
        let mut counter_reset = false;
        let mut delta = |field: &'static str, before: u64, after: u64| -> u64 {
            if after < before {
                warn!(
                    pool = %curr.name,
                    field,
                    before,
                    after,
                    "Counter went backwards; treating delta as zero"
                );
                counter_reset = true;
            }
            after.saturating_sub(before)
        };

        let write_ops = delta("write_ops", prev.write_ops, curr.write_ops);
        let write_bytes = delta("write_bytes", prev.write_bytes, curr.write_bytes);
        let read_ops = delta("read_ops", prev.read_ops, curr.read_ops);
        let read_bytes = delta("read_bytes", prev.read_bytes, curr.read_bytes);
        // Object count and stored size are gauges: deletes shrink them
        // legitimately, so shrinkage shows as zero growth without a warning.
        let objects = curr.num_objects.saturating_sub(prev.num_objects);
        let size_bytes = curr.size_bytes.saturating_sub(prev.size_bytes);

        Self {
            name: curr.name.clone(),
            write_ops: write_ops / t,
            write_mib: write_bytes / MIB / t,
            read_ops: read_ops / t,
            read_mib: read_bytes / MIB / t,
            objects: objects / t,
            size_mib: size_bytes / MIB / t,
            counter_reset,
        }
    }
}

/// Rates for every pool present in both snapshots, ordered by pool name.
///
/// Pools that appear in only one of the two snapshots (created, deleted or
/// renamed in between) produce no row for this interval.
pub fn compute_rates(
    prev: &ClusterStats,
    curr: &ClusterStats,
    interval_secs: NonZeroU64,
) -> Vec<PoolRates> {
    let by_name: HashMap<&str, &PoolStats> =
        prev.pools.iter().map(|p| (p.name.as_str(), p)).collect();

    let mut pools: Vec<&PoolStats> = curr.pools.iter().collect();
    pools.sort_by(|a, b| a.name.cmp(&b.name));

    pools
        .into_iter()
        .filter_map(|pool| match by_name.get(pool.name.as_str()) {
            Some(old) => Some(PoolRates::from_delta(old, pool, interval_secs)),
            None => {
                debug!(pool = %pool.name, "Pool has no previous sample; skipping");
                None
            }
        })
        .collect()
}
