use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::enums::{
    CheckpointEventType, CheckpointStatus, CoordinatorStateKind, CoverageStatus, DataSource,
    DetectionStatus, EvidenceSourceType, FrameworkLayer, PatternKind, Source, WorkloadType,
};

// ============================================================================
// Identifiers
// ============================================================================

/// Stable external identifier for a workload.
///
/// Wrapping this in a newtype (rather than passing bare `String`s around)
/// makes it a compile error to pass a pod uid where a workload uid is
/// expected.
///
/// # Examples
///
/// ```
/// use detect_core::WorkloadUid;
///
/// let uid = WorkloadUid::new("w-1234");
/// assert_eq!(uid.as_str(), "w-1234");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkloadUid(String);

impl WorkloadUid {
    /// Wrap a raw string as a workload uid.
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkloadUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkloadUid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkloadUid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stable external identifier for a pod.
///
/// # Examples
///
/// ```
/// use detect_core::PodUid;
///
/// let uid = PodUid::new("pod-abc");
/// assert_eq!(uid.as_str(), "pod-abc");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PodUid(String);

impl PodUid {
    /// Wrap a raw string as a pod uid.
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PodUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PodUid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PodUid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Canonical lowercase identifier for an AI framework, e.g. `"primus"`,
/// `"megatron"`, `"vllm"`.
pub type Framework = String;

// ============================================================================
// Data model (spec.md §3)
// ============================================================================

/// Per `(workload_uid, source)` collection status row.
///
/// # Examples
///
/// ```
/// use detect_core::{DetectionCoverage, WorkloadUid, Source, CoverageStatus};
///
/// let coverage = DetectionCoverage::new(WorkloadUid::new("w-1"), Source::Process);
/// assert_eq!(coverage.status, CoverageStatus::Pending);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionCoverage {
    /// Owning workload.
    pub workload_uid: WorkloadUid,
    /// Which evidence channel this row tracks.
    pub source: Source,
    /// Current collection status.
    pub status: CoverageStatus,
    /// Number of Evidence rows this source has produced for the workload.
    pub evidence_count: u32,
    /// Number of collection attempts made so far.
    pub attempt_count: u32,
    /// Message from the most recent failed attempt, if any.
    pub last_error: Option<String>,
    /// Earliest timestamp for which log data is known to exist upstream.
    /// Only meaningful for `source = Log`.
    pub log_available_from: Option<chrono::DateTime<chrono::Utc>>,
    /// Latest timestamp for which log data is known to exist upstream.
    /// Only meaningful for `source = Log`.
    pub log_available_to: Option<chrono::DateTime<chrono::Utc>>,
    /// Start of the interval already scanned by the log probe.
    pub covered_from: Option<chrono::DateTime<chrono::Utc>>,
    /// End of the interval already scanned by the log probe.
    pub covered_to: Option<chrono::DateTime<chrono::Utc>>,
}

impl DetectionCoverage {
    /// Create a fresh, `pending` coverage row for a `(workload, source)` pair.
    #[must_use]
    pub fn new(workload_uid: WorkloadUid, source: Source) -> Self {
        Self {
            workload_uid,
            source,
            status: CoverageStatus::Pending,
            evidence_count: 0,
            attempt_count: 0,
            last_error: None,
            log_available_from: None,
            log_available_to: None,
            covered_from: None,
            covered_to: None,
        }
    }

    /// Whether this source is already settled and should not be re-probed,
    /// per the sticky-`collected` invariant (non-log sources only).
    #[must_use]
    pub fn is_settled(&self, max_attempts: u32) -> bool {
        match self.status {
            CoverageStatus::Collected if self.source != Source::Log => self.evidence_count > 0,
            CoverageStatus::Failed => self.attempt_count >= max_attempts,
            _ => false,
        }
    }
}

/// A single `(workload_uid, source, framework)` observation.
///
/// # Examples
///
/// ```
/// use detect_core::{Evidence, WorkloadUid, Source, EvidenceSourceType, WorkloadType, FrameworkLayer};
///
/// let evidence = Evidence::new(
///     WorkloadUid::new("w-1"),
///     Source::Process,
///     "primus".to_string(),
///     EvidenceSourceType::Active,
///     WorkloadType::Training,
///     0.85,
/// );
/// assert_eq!(evidence.framework_layer, FrameworkLayer::Base);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Owning workload.
    pub workload_uid: WorkloadUid,
    /// Channel this observation came through.
    pub source: Source,
    /// Canonical lowercase framework identifier.
    pub framework: Framework,
    /// Whether this was actively probed for or passively observed.
    pub source_type: EvidenceSourceType,
    /// Training vs inference, as inferred at this evidence row alone.
    pub workload_type: WorkloadType,
    /// Confidence in `[0, 1]` assigned by the probe that produced this row.
    pub confidence: f64,
    /// Layer this framework occupies; defaults to `base` until the
    /// aggregator's layer resolver overrides it.
    pub framework_layer: FrameworkLayer,
    /// The wrapper framework, if this evidence's framework is itself a base
    /// wrapped by something else.
    pub wrapper_framework: Option<Framework>,
    /// The base framework, if this evidence's framework is itself a wrapper.
    pub base_framework: Option<Framework>,
    /// Free-form matched values / method, schemaless at this boundary.
    pub payload: serde_json::Value,
    /// When this row was first written.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// When this row was last updated (repeat submissions update in place).
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Evidence {
    /// Create a new evidence row with `created_at == updated_at == now`.
    #[must_use]
    pub fn new(
        workload_uid: WorkloadUid,
        source: Source,
        framework: Framework,
        source_type: EvidenceSourceType,
        workload_type: WorkloadType,
        confidence: f64,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            workload_uid,
            source,
            framework,
            source_type,
            workload_type,
            confidence: confidence.clamp(0.0, 1.0),
            framework_layer: FrameworkLayer::Base,
            wrapper_framework: None,
            base_framework: None,
            payload: serde_json::Value::Object(serde_json::Map::new()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// The confirmed (or still-pending) verdict for a workload.
///
/// # Examples
///
/// ```
/// use detect_core::{WorkloadDetection, WorkloadUid};
///
/// let detection = WorkloadDetection::pending(WorkloadUid::new("w-1"));
/// assert!(!detection.is_confirmed());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadDetection {
    /// Owning workload.
    pub workload_uid: WorkloadUid,
    /// Top-level framework: the wrapper when present, else the base.
    pub framework: Option<Framework>,
    /// All frameworks contributing to the verdict (wrapper + base, etc.).
    pub frameworks: Vec<Framework>,
    /// Training vs inference verdict.
    pub workload_type: WorkloadType,
    /// Aggregate confidence in `[0, 1]`.
    pub confidence: f64,
    /// Whether this verdict has crossed the confirm threshold.
    pub status: DetectionStatus,
    /// Layer of the top-level framework.
    pub framework_layer: FrameworkLayer,
    /// Wrapper framework, if any.
    pub wrapper_framework: Option<Framework>,
    /// Base framework, if any.
    pub base_framework: Option<Framework>,
    /// When this row was first created.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// When this row was last updated.
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl WorkloadDetection {
    /// Build an empty, unconfirmed verdict for a freshly-seen workload.
    #[must_use]
    pub fn pending(workload_uid: WorkloadUid) -> Self {
        let now = chrono::Utc::now();
        Self {
            workload_uid,
            framework: None,
            frameworks: Vec::new(),
            workload_type: WorkloadType::Unknown,
            confidence: 0.0,
            status: DetectionStatus::Pending,
            framework_layer: FrameworkLayer::Base,
            wrapper_framework: None,
            base_framework: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the verdict has been confirmed.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.status == DetectionStatus::Confirmed
    }
}

/// Bookkeeping the coordinator keeps inside the task row for a workload.
///
/// # Examples
///
/// ```
/// use detect_core::{CoordinatorState, WorkloadUid};
///
/// let state = CoordinatorState::new(WorkloadUid::new("w-1"));
/// assert_eq!(state.attempt_count, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorState {
    /// Owning workload.
    pub workload_uid: WorkloadUid,
    /// Current state-machine state.
    pub coordinator_state: CoordinatorStateKind,
    /// Next time the dispatcher should invoke `tick`.
    pub next_schedule_at: chrono::DateTime<chrono::Utc>,
    /// Number of ANALYZING re-entries so far (caps the process probe).
    pub attempt_count: u32,
    /// When this row was first created.
    pub initialized_at: chrono::DateTime<chrono::Utc>,
    /// When the current (or most recent) PROBING phase began.
    pub probing_started_at: Option<chrono::DateTime<chrono::Utc>>,
    /// When the current (or most recent) PROBING phase ended.
    pub probing_completed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Free-form per-workload configuration overrides, overlaid on the
    /// process-wide configuration.
    pub ext: serde_json::Value,
}

impl CoordinatorState {
    /// Create the initial state row for a workload on its first tick.
    #[must_use]
    pub fn new(workload_uid: WorkloadUid) -> Self {
        let now = chrono::Utc::now();
        Self {
            workload_uid,
            coordinator_state: CoordinatorStateKind::Init,
            next_schedule_at: now,
            attempt_count: 0,
            initialized_at: now,
            probing_started_at: None,
            probing_completed_at: None,
            ext: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// A compiled, ready-to-match regex entry from the pattern registry.
///
/// # Examples
///
/// ```
/// use detect_core::{CompiledPatternRecord, PatternKind};
///
/// let record = CompiledPatternRecord {
///     id: 1,
///     kind: PatternKind::Performance,
///     subtype: None,
///     regex: r"iteration (?P<current_iteration>\d+)".to_string(),
///     priority: 100,
///     confidence: 0.9,
///     framework_hint: None,
///     enabled: true,
///     updated_at: chrono::Utc::now(),
/// };
/// assert_eq!(record.kind, PatternKind::Performance);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledPatternRecord {
    /// Catalogue row identifier.
    pub id: i64,
    /// Which bucket this pattern belongs to.
    pub kind: PatternKind,
    /// Required for `training_event` / `checkpoint_event` kinds
    /// (e.g. `"start_training"`, `"start_saving"`).
    pub subtype: Option<String>,
    /// The regular expression source text.
    pub regex: String,
    /// Higher priority patterns are tried first within a kind.
    pub priority: i32,
    /// Confidence to assign to evidence produced by a match of this pattern.
    pub confidence: f64,
    /// Framework this pattern is known to indicate, if any.
    pub framework_hint: Option<Framework>,
    /// Whether the catalogue has this pattern enabled.
    pub enabled: bool,
    /// Used by the hot-reload loop to detect changed rows.
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// One per-iteration training telemetry row.
///
/// Unique on `(workload_uid, serial, iteration)`.
///
/// # Examples
///
/// ```
/// use detect_core::{TrainingPerformance, WorkloadUid, PodUid, DataSource};
/// use serde_json::json;
///
/// let row = TrainingPerformance::new(
///     WorkloadUid::new("w-1"),
///     Some(PodUid::new("w1-master-0")),
///     1,
///     126,
///     DataSource::Log,
///     json!({"lm_loss": 6.548988e-3}),
/// );
/// assert_eq!(row.iteration, 126);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPerformance {
    /// Storage-assigned row identifier (absent before the first write).
    pub id: Option<i64>,
    /// Owning workload.
    pub workload_uid: WorkloadUid,
    /// Pod this reading came from, when known.
    pub pod_uid: Option<PodUid>,
    /// Run sequence number; increases each time a new `start_training` is seen.
    pub serial: u32,
    /// Training iteration / step number.
    pub iteration: u64,
    /// Where this reading originated.
    pub data_source: DataSource,
    /// Nested metric map, including a `history` array of prior versions.
    pub performance: serde_json::Value,
    /// When this row was first created.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// When this row was last updated.
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TrainingPerformance {
    /// Build a fresh row (no prior history) for a given step.
    #[must_use]
    pub fn new(
        workload_uid: WorkloadUid,
        pod_uid: Option<PodUid>,
        serial: u32,
        iteration: u64,
        data_source: DataSource,
        performance: serde_json::Value,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: None,
            workload_uid,
            pod_uid,
            serial,
            iteration,
            data_source,
            performance,
            created_at: now,
            updated_at: now,
        }
    }

    /// Key used for the uniqueness invariant and in-memory dedup maps.
    #[must_use]
    pub fn key(&self) -> (WorkloadUid, u32, u64) {
        (self.workload_uid.clone(), self.serial, self.iteration)
    }
}

/// A single checkpoint save/load lifecycle event.
///
/// # Examples
///
/// ```
/// use detect_core::{CheckpointEvent, WorkloadUid, CheckpointEventType, CheckpointStatus};
///
/// let event = CheckpointEvent::start_saving(WorkloadUid::new("w-1"), 500, "/ckpt/500".to_string());
/// assert_eq!(event.status, CheckpointStatus::InProgress);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointEvent {
    /// Owning workload.
    pub workload_uid: WorkloadUid,
    /// Training iteration the checkpoint corresponds to.
    pub iteration: u64,
    /// Which lifecycle phase this row describes.
    pub event_type: CheckpointEventType,
    /// Filesystem path of the checkpoint, when known.
    pub checkpoint_path: Option<String>,
    /// When the save/load began.
    pub start_time: chrono::DateTime<chrono::Utc>,
    /// When the save/load ended, once known.
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Elapsed duration in milliseconds, once known.
    pub duration_ms: Option<u64>,
    /// Whether this used an accelerated checkpoint path.
    pub is_fast_ckpt: bool,
    /// Current status.
    pub status: CheckpointStatus,
    /// Free-form extra fields captured from the matching pattern.
    pub metadata: serde_json::Value,
}

impl CheckpointEvent {
    /// Start an in-progress checkpoint-save event.
    #[must_use]
    pub fn start_saving(workload_uid: WorkloadUid, iteration: u64, checkpoint_path: String) -> Self {
        Self {
            workload_uid,
            iteration,
            event_type: CheckpointEventType::StartSaving,
            checkpoint_path: Some(checkpoint_path),
            start_time: chrono::Utc::now(),
            end_time: None,
            duration_ms: None,
            is_fast_ckpt: false,
            status: CheckpointStatus::InProgress,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Key used to pair a `start_saving` with its later `end_saving`.
    #[must_use]
    pub fn pending_key(&self) -> (WorkloadUid, u64) {
        (self.workload_uid.clone(), self.iteration)
    }
}

// ============================================================================
// Log pipeline / push telemetry ingress shapes (spec.md §6)
// ============================================================================

/// One ingested log line handed to the log pipeline hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    /// Pod this line came from.
    pub pod_uid: PodUid,
    /// Raw line content (may still contain ANSI CSI sequences).
    pub message: String,
    /// Timestamp the receiver assigned to this line.
    pub log_time: chrono::DateTime<chrono::Utc>,
}

/// A single metric sample pushed by an in-process exporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Metric name.
    pub name: String,
    /// Metric value.
    pub value: f64,
    /// Training step this point belongs to.
    pub step: u64,
    /// When the exporter recorded the point.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Request schema for the push-telemetry ingress (spec.md §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestMetricsRequest {
    /// Workload identity, if already resolved by the caller.
    pub workload_uid: Option<WorkloadUid>,
    /// Pod identity, when known.
    pub pod_uid: Option<PodUid>,
    /// Pod name; required when `workload_uid` is absent.
    pub pod_name: Option<String>,
    /// Exporter-assigned run identifier.
    pub run_id: String,
    /// Metric samples in this batch.
    pub metrics: Vec<MetricPoint>,
}

/// Response schema for the push-telemetry ingress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestMetricsResponse {
    /// Whether ingestion succeeded overall.
    pub ok: bool,
    /// Number of training-performance rows written or updated.
    pub processed_count: usize,
    /// Error message, present only when `ok == false`.
    pub error: Option<String>,
}

/// A workload-owned reference to one of its pods, as returned by the
/// cluster API collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodRef {
    /// Pod identifier.
    pub pod_uid: PodUid,
    /// Pod name (used for the `*-master-0` preference rule).
    pub name: String,
}

/// A follow-up task emitted on confirmation (spec.md §4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpTask {
    /// Owning workload.
    pub workload_uid: WorkloadUid,
    /// Dispatcher-defined task type name.
    pub task_type: String,
    /// Task-specific payload.
    pub payload: serde_json::Value,
}

/// Group captures extracted from a regex match, keyed by named capture
/// group name.
pub type GroupMap = HashMap<String, String>;
