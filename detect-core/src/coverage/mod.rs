//! Coverage tracking (spec.md §4.2).
//!
//! Each `(workload_uid, source)` pair moves through
//! `pending -> collecting -> (collected | failed)`. `collected` is sticky
//! for `process`/`image`/`label`; for `log`, subsequent scans only ever
//! extend `covered_from`/`covered_to`, never shrink them.

use crate::storage::StorageBackend;
use crate::types::{CoverageStatus, DetectionCoverage, Source, WorkloadUid};
use crate::Result;

/// Thin wrapper over [`StorageBackend`] implementing the coverage state
/// machine's transition rules.
pub struct CoverageTracker<'a> {
    store: &'a dyn StorageBackend,
}

impl<'a> CoverageTracker<'a> {
    /// Wrap a storage backend.
    pub fn new(store: &'a dyn StorageBackend) -> Self {
        Self { store }
    }

    /// Fetch the coverage row for `(workload_uid, source)`, creating a
    /// fresh `pending` row if none exists yet.
    pub async fn get_or_create(
        &self,
        workload_uid: &WorkloadUid,
        source: Source,
    ) -> Result<DetectionCoverage> {
        if let Some(row) = self.store.get_coverage(workload_uid, source).await? {
            return Ok(row);
        }
        let row = DetectionCoverage::new(workload_uid.clone(), source);
        self.store.upsert_coverage(&row).await?;
        Ok(row)
    }

    /// Mark a source as `collecting`.
    pub async fn mark_collecting(&self, workload_uid: &WorkloadUid, source: Source) -> Result<()> {
        let mut row = self.get_or_create(workload_uid, source).await?;
        row.status = CoverageStatus::Collecting;
        self.store.upsert_coverage(&row).await
    }

    /// Mark a source as `collected`, incrementing `evidence_count` by the
    /// number of new evidence rows the probe produced this run.
    pub async fn mark_collected(
        &self,
        workload_uid: &WorkloadUid,
        source: Source,
        new_evidence_count: u32,
    ) -> Result<()> {
        let mut row = self.get_or_create(workload_uid, source).await?;
        row.status = CoverageStatus::Collected;
        row.evidence_count += new_evidence_count;
        self.store.upsert_coverage(&row).await
    }

    /// Mark a source as `failed`, incrementing `attempt_count` and storing
    /// the error.
    pub async fn mark_failed(
        &self,
        workload_uid: &WorkloadUid,
        source: Source,
        error: impl Into<String>,
    ) -> Result<()> {
        let mut row = self.get_or_create(workload_uid, source).await?;
        row.status = CoverageStatus::Failed;
        row.attempt_count += 1;
        row.last_error = Some(error.into());
        self.store.upsert_coverage(&row).await
    }

    /// Extend the log coverage interval, never shrinking it. Should only
    /// be called for `source = Log`.
    pub async fn extend_log_coverage(
        &self,
        workload_uid: &WorkloadUid,
        scanned_from: chrono::DateTime<chrono::Utc>,
        scanned_to: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let mut row = self.get_or_create(workload_uid, Source::Log).await?;
        row.covered_from = Some(match row.covered_from {
            Some(existing) => existing.min(scanned_from),
            None => scanned_from,
        });
        row.covered_to = Some(match row.covered_to {
            Some(existing) => existing.max(scanned_to),
            None => scanned_to,
        });
        row.status = CoverageStatus::Collected;
        self.store.upsert_coverage(&row).await
    }

    /// Whether a source should be skipped in the next planning cycle
    /// because it is already settled.
    pub async fn is_settled(
        &self,
        workload_uid: &WorkloadUid,
        source: Source,
        max_attempts: u32,
    ) -> Result<bool> {
        Ok(self
            .store
            .get_coverage(workload_uid, source)
            .await?
            .map(|row| row.is_settled(max_attempts))
            .unwrap_or(false))
    }
}

/// The uncovered log window, per spec.md §4.5's algorithm. Returns `None`
/// when there is nothing left to scan.
#[must_use]
pub fn uncovered_log_window(
    coverage: &DetectionCoverage,
) -> Option<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)> {
    let (available_from, available_to) = match (coverage.log_available_from, coverage.log_available_to) {
        (Some(f), Some(t)) => (f, t),
        _ => return None,
    };

    match (coverage.covered_from, coverage.covered_to) {
        (None, None) => Some((available_from, available_to)),
        (Some(covered_from), Some(covered_to)) => {
            if available_to > covered_to {
                Some((covered_to, available_to))
            } else if covered_from > available_from {
                Some((available_from, covered_from))
            } else {
                None
            }
        }
        // Partial state (shouldn't normally occur); treat as never-scanned.
        _ => Some((available_from, available_to)),
    }
}
