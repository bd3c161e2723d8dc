//! Evidence recording (spec.md §4.2).
//!
//! Writes are `upsert(workload_uid, source, framework)`: repeat
//! submissions for the same key update the existing row rather than
//! duplicating it. A batch-write primitive applies a list of rows as a
//! single logical unit per workload.

use std::collections::HashMap;

use crate::storage::StorageBackend;
use crate::types::{Evidence, WorkloadUid};
use crate::Result;

/// Thin upsert-oriented wrapper over [`StorageBackend`] for evidence rows.
pub struct EvidenceRecorder<'a> {
    store: &'a dyn StorageBackend,
}

impl<'a> EvidenceRecorder<'a> {
    /// Wrap a storage backend.
    pub fn new(store: &'a dyn StorageBackend) -> Self {
        Self { store }
    }

    /// Record a single piece of evidence, merging with any existing row
    /// for the same `(workload_uid, source, framework)` key (latest wins).
    pub async fn upsert(&self, mut evidence: Evidence) -> Result<()> {
        let existing = self
            .store
            .list_evidence(&evidence.workload_uid)
            .await?
            .into_iter()
            .find(|e| e.source == evidence.source && e.framework == evidence.framework);

        if let Some(existing) = existing {
            evidence.created_at = existing.created_at;
        }
        evidence.updated_at = chrono::Utc::now();
        self.store.insert_evidence(&evidence).await
    }

    /// Apply a batch of evidence rows for potentially many workloads.
    /// Rows for the same workload are applied in order; a failure partway
    /// through does not roll back rows already written, matching the
    /// "best effort per workload" framing of an upsert-only store.
    pub async fn upsert_batch(&self, rows: Vec<Evidence>) -> Result<()> {
        let mut by_workload: HashMap<WorkloadUid, Vec<Evidence>> = HashMap::new();
        for row in rows {
            by_workload.entry(row.workload_uid.clone()).or_default().push(row);
        }
        for (_, rows) in by_workload {
            for row in rows {
                self.upsert(row).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EvidenceSourceType, Source, WorkloadType};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        evidence: Mutex<Vec<Evidence>>,
    }

    #[async_trait]
    impl StorageBackend for FakeStore {
        async fn upsert_coverage(&self, _: &crate::types::DetectionCoverage) -> Result<()> {
            Ok(())
        }
        async fn get_coverage(
            &self,
            _: &WorkloadUid,
            _: Source,
        ) -> Result<Option<crate::types::DetectionCoverage>> {
            Ok(None)
        }
        async fn list_coverage(&self, _: &WorkloadUid) -> Result<Vec<crate::types::DetectionCoverage>> {
            Ok(vec![])
        }
        async fn insert_evidence(&self, evidence: &Evidence) -> Result<()> {
            let mut rows = self.evidence.lock().unwrap();
            rows.retain(|e| {
                !(e.workload_uid == evidence.workload_uid
                    && e.source == evidence.source
                    && e.framework == evidence.framework)
            });
            rows.push(evidence.clone());
            Ok(())
        }
        async fn list_evidence(&self, workload_uid: &WorkloadUid) -> Result<Vec<Evidence>> {
            Ok(self
                .evidence
                .lock()
                .unwrap()
                .iter()
                .filter(|e| &e.workload_uid == workload_uid)
                .cloned()
                .collect())
        }
        async fn upsert_detection(&self, _: &crate::types::WorkloadDetection) -> Result<()> {
            Ok(())
        }
        async fn get_detection(&self, _: &WorkloadUid) -> Result<Option<crate::types::WorkloadDetection>> {
            Ok(None)
        }
        async fn upsert_coordinator_state(&self, _: &crate::types::CoordinatorState) -> Result<()> {
            Ok(())
        }
        async fn get_coordinator_state(
            &self,
            _: &WorkloadUid,
        ) -> Result<Option<crate::types::CoordinatorState>> {
            Ok(None)
        }
        async fn list_due_coordinator_states(
            &self,
            _: chrono::DateTime<chrono::Utc>,
        ) -> Result<Vec<crate::types::CoordinatorState>> {
            Ok(vec![])
        }
        async fn list_patterns(&self) -> Result<Vec<crate::types::CompiledPatternRecord>> {
            Ok(vec![])
        }
        async fn upsert_training_performance(&self, _: &crate::types::TrainingPerformance) -> Result<()> {
            Ok(())
        }
        async fn latest_training_performance(
            &self,
            _: &WorkloadUid,
        ) -> Result<Option<crate::types::TrainingPerformance>> {
            Ok(None)
        }
        async fn upsert_checkpoint_event(&self, _: &crate::types::CheckpointEvent) -> Result<()> {
            Ok(())
        }
        async fn list_checkpoint_events(&self, _: &WorkloadUid) -> Result<Vec<crate::types::CheckpointEvent>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_upsert_does_not_duplicate() {
        let store = FakeStore::default();
        let recorder = EvidenceRecorder::new(&store);
        let workload_uid = WorkloadUid::new("w-1");

        let first = Evidence::new(
            workload_uid.clone(),
            Source::Process,
            "primus".to_string(),
            EvidenceSourceType::Active,
            WorkloadType::Training,
            0.75,
        );
        recorder.upsert(first.clone()).await.unwrap();

        let mut second = first.clone();
        second.confidence = 0.9;
        recorder.upsert(second).await.unwrap();

        let rows = store.list_evidence(&workload_uid).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].confidence, 0.9);
    }

    #[tokio::test]
    async fn test_upsert_preserves_created_at_on_update() {
        let store = FakeStore::default();
        let recorder = EvidenceRecorder::new(&store);
        let workload_uid = WorkloadUid::new("w-1");
        let first = Evidence::new(
            workload_uid.clone(),
            Source::Log,
            "megatron".to_string(),
            EvidenceSourceType::Passive,
            WorkloadType::Training,
            0.9,
        );
        let original_created_at = first.created_at;
        recorder.upsert(first.clone()).await.unwrap();

        std::thread::sleep(std::time::Duration::from_millis(2));
        let mut second = first;
        second.confidence = 0.95;
        recorder.upsert(second).await.unwrap();

        let rows = store.list_evidence(&workload_uid).await.unwrap();
        assert_eq!(rows[0].created_at, original_created_at);
        assert!(rows[0].updated_at > original_created_at);
    }
}
