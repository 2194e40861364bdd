//! Cluster usage snapshots decoded from `rados df -f json`.
//!
//! A snapshot holds the cumulative counters the cluster reports at one point
//! in time. Rates are derived later from two consecutive snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors raised while decoding a report document.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to decode cluster usage report: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Usage and traffic counters for one pool.
///
/// Traffic counters are cumulative since the pool was created and never
/// decrease while the backing daemons stay up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolStats {
    /// Pool name; unique within a snapshot.
    pub name: String,
    /// Numeric pool id.
    pub id: u64,
    pub size_bytes: u64,
    pub size_kb: u64,
    pub num_objects: u64,
    pub num_object_clones: u64,
    pub num_object_copies: u64,
    pub num_objects_missing_on_primary: u64,
    pub num_objects_unfound: u64,
    pub num_objects_degraded: u64,
    /// Read operations completed.
    pub read_ops: u64,
    pub read_bytes: u64,
    /// Write operations completed.
    pub write_ops: u64,
    pub write_bytes: u64,
}

/// Cluster-wide usage plus per-pool counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterStats {
    pub total_objects: u64,
    /// Bytes used across the cluster.
    pub total_used: u64,
    /// Bytes still available.
    pub total_avail: u64,
    /// Raw capacity in bytes.
    pub total_space: u64,
    /// Pools in the order the backend reported them.
    pub pools: Vec<PoolStats>,
    /// When this snapshot was decoded.
    #[serde(skip)]
    pub collected_at: Option<DateTime<Utc>>,
}

impl ClusterStats {
    /// Decode a report document.
    ///
    /// Unknown keys are ignored and missing keys read as zero. Anything that is
    /// not a JSON object of the expected shape is an error.
    pub fn parse(raw: &str) -> Result<Self, SnapshotError> {
        let mut stats: Self = serde_json::from_str(raw)?;
        let collected_at = Utc::now();
        stats.collected_at = Some(collected_at);

        debug!(
            collected_at = %collected_at,
            pools = stats.pools.len(),
            total_objects = stats.total_objects,
            total_used = stats.total_used,
            total_avail = stats.total_avail,
            "Decoded cluster usage snapshot"
        );

        Ok(stats)
    }

    /// Decode `raw` into `self`, reusing the existing pool allocation.
    ///
    /// On error `self` is left untouched.
    pub fn refill(&mut self, raw: &str) -> Result<(), SnapshotError> {
        let mut fresh = Self::parse(raw)?;

        self.pools.clear();
        self.pools.append(&mut fresh.pools);
        self.total_objects = fresh.total_objects;
        self.total_used = fresh.total_used;
        self.total_avail = fresh.total_avail;
        self.total_space = fresh.total_space;
        self.collected_at = fresh.collected_at;

        Ok(())
    }

    /// Find a pool by name.
    pub fn pool(&self, name: &str) -> Option<&PoolStats> {
        self.pools.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Pool with only the counters the rate table cares about.
    pub fn pool(name: &str, counters: [u64; 6]) -> PoolStats {
        let [write_ops, write_bytes, read_ops, read_bytes, num_objects, size_bytes] = counters;
        PoolStats {
            name: name.to_string(),
            write_ops,
            write_bytes,
            read_ops,
            read_bytes,
            num_objects,
            size_bytes,
            size_kb: size_bytes / 1024,
            ..Default::default()
        }
    }

    pub fn cluster(pools: Vec<PoolStats>) -> ClusterStats {
        ClusterStats {
            total_objects: pools.iter().map(|p| p.num_objects).sum(),
            pools,
            ..Default::default()
        }
    }

    /// Report document in the shape `rados df -f json` emits.
    pub fn report(pools: &[PoolStats]) -> String {
        let pools: Vec<serde_json::Value> = pools
            .iter()
            .map(|p| {
                let mut value = serde_json::to_value(p).unwrap_or_default();
                if let Some(obj) = value.as_object_mut() {
                    obj.insert("quota_bytes".to_string(), serde_json::json!(0));
                }
                value
            })
            .collect();

        serde_json::json!({
            "pools": pools,
            "total_objects": 0,
            "total_used": 1_073_741_824u64,
            "total_avail": 3_221_225_472u64,
            "total_space": 4_294_967_296u64,
        })
        .to_string()
    }
}
