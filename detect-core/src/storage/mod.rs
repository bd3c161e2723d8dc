//! # Storage and Collaborator Abstractions
//!
//! Unified trait for the durable store behind the detection pipeline, plus
//! the narrow collaborator traits the coordinator uses to reach the
//! surrounding cluster (pod/process inspection, sub-task dispatch, and the
//! Kubernetes API). Keeping these as traits lets the coordinator and probes
//! be tested against in-memory fakes without a real database or cluster.

pub mod circuit_breaker;

use async_trait::async_trait;

use crate::types::{
    CheckpointEvent, CompiledPatternRecord, CoordinatorState, DetectionCoverage, Evidence,
    PodUid, Source, TrainingPerformance, WorkloadDetection, WorkloadUid,
};
use crate::Result;

/// Unified storage backend trait for the detection pipeline's durable
/// state.
///
/// Each data-model table in spec.md §3 gets an upsert-by-key write path and
/// a small set of read paths; there is no generic query builder, matching
/// the narrow access pattern the coordinator and probes actually need.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Insert or update a coverage row, keyed on `(workload_uid, source)`.
    async fn upsert_coverage(&self, coverage: &DetectionCoverage) -> Result<()>;

    /// Fetch a single coverage row.
    async fn get_coverage(
        &self,
        workload_uid: &WorkloadUid,
        source: Source,
    ) -> Result<Option<DetectionCoverage>>;

    /// List every coverage row for a workload, one per source.
    async fn list_coverage(&self, workload_uid: &WorkloadUid) -> Result<Vec<DetectionCoverage>>;

    /// Insert a new evidence row. Evidence is append-only from the
    /// perspective of probes; repeat submissions for the same
    /// `(workload_uid, source, framework)` key are merged by the caller
    /// before this is invoked.
    async fn insert_evidence(&self, evidence: &Evidence) -> Result<()>;

    /// List all evidence collected for a workload.
    async fn list_evidence(&self, workload_uid: &WorkloadUid) -> Result<Vec<Evidence>>;

    /// Insert or update the detection verdict for a workload.
    async fn upsert_detection(&self, detection: &WorkloadDetection) -> Result<()>;

    /// Fetch the current detection verdict for a workload, if one exists.
    async fn get_detection(&self, workload_uid: &WorkloadUid) -> Result<Option<WorkloadDetection>>;

    /// Insert or update the coordinator state row for a workload.
    async fn upsert_coordinator_state(&self, state: &CoordinatorState) -> Result<()>;

    /// Fetch the coordinator state row for a workload, if one exists.
    async fn get_coordinator_state(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Option<CoordinatorState>>;

    /// List every workload with a coordinator state row whose
    /// `next_schedule_at` is at or before `now`, ready to be ticked.
    async fn list_due_coordinator_states(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<CoordinatorState>>;

    /// List all enabled, compiled patterns, ordered by kind then priority
    /// descending.
    async fn list_patterns(&self) -> Result<Vec<CompiledPatternRecord>>;

    /// Upsert a training-performance row, merging into any existing row's
    /// `history` array for the same `(workload_uid, serial, iteration)`
    /// key rather than overwriting it.
    async fn upsert_training_performance(&self, row: &TrainingPerformance) -> Result<()>;

    /// Fetch the most recent training-performance row for a workload.
    async fn latest_training_performance(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<Option<TrainingPerformance>>;

    /// Insert or update a checkpoint lifecycle event, keyed on
    /// `(workload_uid, iteration, event_type)`.
    async fn upsert_checkpoint_event(&self, event: &CheckpointEvent) -> Result<()>;

    /// List checkpoint events for a workload, most recent first.
    async fn list_checkpoint_events(&self, workload_uid: &WorkloadUid) -> Result<Vec<CheckpointEvent>>;
}

/// Process-inspection collaborator used by the process probe (spec.md
/// §4.4). Implementations talk to a node agent daemon running alongside
/// the kubelet; a test double can serve canned process trees instead.
#[async_trait]
pub trait NodeAgentClient: Send + Sync {
    /// Return the cmdline and environment of every process in the target
    /// pod's cgroup, flattened into a single list for pattern matching.
    async fn process_tree(&self, pod_uid: &PodUid) -> Result<Vec<ProcessInfo>>;
}

/// A single process observed inside a pod's cgroup.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ProcessInfo {
    /// OS process id.
    pub pid: u32,
    /// Full command line, space-joined.
    pub cmdline: String,
    /// Environment variables visible to the process.
    pub env: std::collections::HashMap<String, String>,
}

/// Dispatch collaborator for follow-up tasks emitted on confirmation
/// (spec.md §4.6). Decoupled from any specific downstream system so the
/// coordinator can be tested without one.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    /// Submit a follow-up task for asynchronous processing. Must not block
    /// on the task's completion.
    async fn dispatch(&self, task: crate::types::FollowUpTask) -> Result<()>;
}

/// Kubernetes-facing collaborator used by the pod prober (spec.md §4.9) and
/// the image/label probes (spec.md §4.4).
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List the pods currently owned by a workload.
    async fn list_pods(&self, workload_uid: &WorkloadUid) -> Result<Vec<crate::types::PodRef>>;

    /// Fetch the container image references for a pod.
    async fn pod_images(&self, pod_uid: &PodUid) -> Result<Vec<String>>;

    /// Fetch the labels attached to a pod.
    async fn pod_labels(&self, pod_uid: &PodUid) -> Result<std::collections::HashMap<String, String>>;

    /// Age of the pod since it started running.
    async fn pod_age(&self, pod_uid: &PodUid) -> Result<std::time::Duration>;

    /// Current lifecycle status of the pod's workload, used to decide
    /// whether to keep probing or give up.
    async fn workload_lifecycle_status(
        &self,
        workload_uid: &WorkloadUid,
    ) -> Result<crate::types::WorkloadLifecycleStatus>;
}
