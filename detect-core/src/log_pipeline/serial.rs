//! Run-serial computation and in-memory pending-checkpoint bookkeeping.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::WorkloadUid;

/// Compute the next training-run serial number: `1` if no prior
/// `start_training` event exists, else `latest + 1`.
#[must_use]
pub fn next_training_serial(latest: Option<u32>) -> u32 {
    latest.map_or(1, |n| n + 1)
}

/// Tracks in-flight checkpoint saves keyed by `(workload_uid, iteration)`,
/// so an `end_saving` line can be paired with its `start_saving`.
#[derive(Default)]
pub struct PendingCheckpoints {
    inner: Mutex<HashMap<(WorkloadUid, u64), chrono::DateTime<chrono::Utc>>>,
}

impl PendingCheckpoints {
    /// Construct an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a checkpoint save started at `start_time`.
    pub fn insert(&self, key: (WorkloadUid, u64), start_time: chrono::DateTime<chrono::Utc>) {
        self.inner.lock().unwrap().insert(key, start_time);
    }

    /// Remove and return the start time for a pending checkpoint, if any.
    pub fn take(&self, key: &(WorkloadUid, u64)) -> Option<chrono::DateTime<chrono::Utc>> {
        self.inner.lock().unwrap().remove(key)
    }
}
