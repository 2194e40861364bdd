//! Two-slot snapshot storage.
//!
//! The store keeps exactly the current and the previous snapshot. Each new
//! report is decoded into whichever slot is not current, then the roles flip,
//! so the older pool vector is reused instead of reallocated every cycle.

use crate::collect::{ClusterStats, SnapshotError};
use tracing::trace;

#[derive(Debug, Default)]
pub struct SnapshotStore {
    slots: [ClusterStats; 2],
    /// Index of the slot holding the most recent snapshot.
    current: usize,
    /// Successful ingests so far, saturating at 2.
    filled: u8,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `raw` into the spare slot and make it current.
    ///
    /// A decode failure leaves both slots and their roles unchanged.
    pub fn ingest(&mut self, raw: &str) -> Result<(), SnapshotError> {
        let spare = self.spare();
        self.slots[spare].refill(raw)?;
        self.current = spare;
        self.filled = (self.filled + 1).min(2);

        trace!(slot = spare, filled = self.filled, "Snapshot slot rotated");
        Ok(())
    }

    pub fn current(&self) -> Option<&ClusterStats> {
        (self.filled >= 1).then(|| &self.slots[self.current])
    }

    /// The snapshot before the current one, once two have been ingested.
    pub fn previous(&self) -> Option<&ClusterStats> {
        (self.filled >= 2).then(|| &self.slots[self.spare()])
    }

    /// `(previous, current)` when both exist.
    pub fn pair(&self) -> Option<(&ClusterStats, &ClusterStats)> {
        Some((self.previous()?, self.current()?))
    }

    /// True once a previous snapshot is available for diffing.
    pub fn is_primed(&self) -> bool {
        self.filled >= 2
    }

    fn spare(&self) -> usize {
        1 - self.current
    }
}
