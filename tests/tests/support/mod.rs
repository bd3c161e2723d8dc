//! In-memory collaborator doubles shared by the integration tests.
//!
//! These mirror the trait boundaries in `detect_core::storage` so the
//! coordinator and probes can be driven end-to-end without a real
//! database, cluster, or node agent.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use detect_core::storage::{ClusterApi, NodeAgentClient, ProcessInfo, TaskDispatcher};
use detect_core::{
    CheckpointEvent, CompiledPatternRecord, CoordinatorState, DetectionCoverage, Evidence,
    FollowUpTask, PodRef, PodUid, Result, Source, StorageBackend, TrainingPerformance,
    WorkloadDetection, WorkloadLifecycleStatus, WorkloadUid,
};

/// A fully in-memory `StorageBackend`, keyed the same way the SQL schema
/// keys its tables, guarded by a single mutex (tests are single-threaded
/// per workload, so contention is a non-issue).
#[derive(Default)]
pub struct InMemoryStorage {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    coverage: HashMap<(WorkloadUid, Source), DetectionCoverage>,
    evidence: Vec<Evidence>,
    detection: HashMap<WorkloadUid, WorkloadDetection>,
    coordinator_state: HashMap<WorkloadUid, CoordinatorState>,
    patterns: Vec<CompiledPatternRecord>,
    training_performance: Vec<TrainingPerformance>,
    checkpoint_events: Vec<CheckpointEvent>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the pattern catalogue the registry loads from.
    pub fn seed_patterns(&self, patterns: Vec<CompiledPatternRecord>) {
        self.inner.lock().unwrap().patterns = patterns;
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn upsert_coverage(&self, coverage: &DetectionCoverage) -> Result<()> {
        let mut tables = self.inner.lock().unwrap();
        tables
            .coverage
            .insert((coverage.workload_uid.clone(), coverage.source), coverage.clone());
        Ok(())
    }

    async fn get_coverage(
        &self,
        workload_uid: &WorkloadUid,
        source: Source,
    ) -> Result<Option<DetectionCoverage>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.coverage.get(&(workload_uid.clone(), source)).cloned())
    }

    async fn list_coverage(&self, workload_uid: &WorkloadUid) -> Result<Vec<DetectionCoverage>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .coverage
            .values()
            .filter(|c| &c.workload_uid == workload_uid)
            .cloned()
            .collect())
    }

    async fn insert_evidence(&self, evidence: &Evidence) -> Result<()> {
        let mut tables = self.inner.lock().unwrap();
        if let Some(existing) = tables.evidence.iter_mut().find(|e| {
            e.workload_uid == evidence.workload_uid
                && e.source == evidence.source
                && e.framework == evidence.framework
        }) {
            *existing = evidence.clone();
        } else {
            tables.evidence.push(evidence.clone());
        }
        Ok(())
    }

    async fn list_evidence(&self, workload_uid: &WorkloadUid) -> Result<Vec<Evidence>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .evidence
            .iter()
            .filter(|e| &e.workload_uid == workload_uid)
            .cloned()
            .collect())
    }

    async fn upsert_detection(&self, detection: &WorkloadDetection) -> Result<()> {
        let mut tables = self.inner.lock().unwrap();
        tables.detection.insert(detection.workload_uid.clone(), detection.clone());
        Ok(())
    }

    async fn get_detection(&self, workload_uid: &WorkloadUid) -> Result<Option<WorkloadDetection>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.detection.get(workload_uid).cloned())
    }

    async fn upsert_coordinator_state(&self, state: &CoordinatorState) -> Result<()> {
        let mut tables = self.inner.lock().unwrap();
        tables.coordinator_state.insert(state.workload_uid.clone(), state.clone());
        Ok(())
    }

    async fn get_coordinator_state(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Option<CoordinatorState>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.coordinator_state.get(workload_uid).cloned())
    }

    async fn list_due_coordinator_states(&self, now: DateTime<Utc>) -> Result<Vec<CoordinatorState>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .coordinator_state
            .values()
            .filter(|s| s.next_schedule_at <= now)
            .cloned()
            .collect())
    }

    async fn list_patterns(&self) -> Result<Vec<CompiledPatternRecord>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.patterns.clone())
    }

    async fn upsert_training_performance(&self, row: &TrainingPerformance) -> Result<()> {
        let mut tables = self.inner.lock().unwrap();
        if let Some(existing) = tables
            .training_performance
            .iter_mut()
            .find(|r| r.key() == row.key())
        {
            *existing = row.clone();
        } else {
            tables.training_performance.push(row.clone());
        }
        Ok(())
    }

    async fn latest_training_performance(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Option<TrainingPerformance>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables
            .training_performance
            .iter()
            .filter(|r| &r.workload_uid == workload_uid)
            .max_by_key(|r| (r.serial, r.iteration))
            .cloned())
    }

    async fn upsert_checkpoint_event(&self, event: &CheckpointEvent) -> Result<()> {
        let mut tables = self.inner.lock().unwrap();
        if let Some(existing) = tables
            .checkpoint_events
            .iter_mut()
            .find(|e| e.pending_key() == event.pending_key() && e.event_type == event.event_type)
        {
            *existing = event.clone();
        } else {
            tables.checkpoint_events.push(event.clone());
        }
        Ok(())
    }

    async fn list_checkpoint_events(&self, workload_uid: &WorkloadUid) -> Result<Vec<CheckpointEvent>> {
        let tables = self.inner.lock().unwrap();
        let mut rows: Vec<_> = tables
            .checkpoint_events
            .iter()
            .filter(|e| &e.workload_uid == workload_uid)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(rows)
    }
}

/// A single pod's scripted state, used by [`FakeCluster`].
#[derive(Clone)]
pub struct ScriptedPod {
    pub pod_uid: PodUid,
    pub name: String,
    pub images: Vec<String>,
    pub labels: HashMap<String, String>,
    pub age: Duration,
}

/// Scripted cluster double: fixed pods, images, labels, ages, and a single
/// workload lifecycle status, settable mid-test.
pub struct FakeCluster {
    pods: Vec<ScriptedPod>,
    lifecycle: Mutex<WorkloadLifecycleStatus>,
}

impl FakeCluster {
    pub fn new(pods: Vec<ScriptedPod>) -> Self {
        Self { pods, lifecycle: Mutex::new(WorkloadLifecycleStatus::Running) }
    }

    pub fn set_lifecycle(&self, status: WorkloadLifecycleStatus) {
        *self.lifecycle.lock().unwrap() = status;
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_pods(&self, _workload_uid: &WorkloadUid) -> Result<Vec<PodRef>> {
        Ok(self
            .pods
            .iter()
            .map(|p| PodRef { pod_uid: p.pod_uid.clone(), name: p.name.clone() })
            .collect())
    }

    async fn pod_images(&self, pod_uid: &PodUid) -> Result<Vec<String>> {
        Ok(self
            .pods
            .iter()
            .find(|p| &p.pod_uid == pod_uid)
            .map(|p| p.images.clone())
            .unwrap_or_default())
    }

    async fn pod_labels(&self, pod_uid: &PodUid) -> Result<HashMap<String, String>> {
        Ok(self
            .pods
            .iter()
            .find(|p| &p.pod_uid == pod_uid)
            .map(|p| p.labels.clone())
            .unwrap_or_default())
    }

    async fn pod_age(&self, pod_uid: &PodUid) -> Result<Duration> {
        Ok(self
            .pods
            .iter()
            .find(|p| &p.pod_uid == pod_uid)
            .map_or(Duration::ZERO, |p| p.age))
    }

    async fn workload_lifecycle_status(
        &self,
        _workload_uid: &WorkloadUid,
    ) -> Result<WorkloadLifecycleStatus> {
        Ok(*self.lifecycle.lock().unwrap())
    }
}

/// Scripted node agent: one process tree per pod.
pub struct FakeNodeAgent {
    trees: HashMap<PodUid, Vec<ProcessInfo>>,
}

impl FakeNodeAgent {
    pub fn new(trees: HashMap<PodUid, Vec<ProcessInfo>>) -> Self {
        Self { trees }
    }
}

#[async_trait]
impl NodeAgentClient for FakeNodeAgent {
    async fn process_tree(&self, pod_uid: &PodUid) -> Result<Vec<ProcessInfo>> {
        Ok(self.trees.get(pod_uid).cloned().unwrap_or_default())
    }
}

/// Dispatcher double recording every follow-up task it receives.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub tasks: Mutex<Vec<FollowUpTask>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskDispatcher for RecordingDispatcher {
    async fn dispatch(&self, task: FollowUpTask) -> Result<()> {
        self.tasks.lock().unwrap().push(task);
        Ok(())
    }
}
