use serde::{Deserialize, Serialize};

// ============================================================================
// Enums
// ============================================================================

/// The channel through which a piece of evidence about a workload was collected.
///
/// # Examples
///
/// ```
/// use detect_core::Source;
///
/// let process = Source::Process;
/// let log = Source::Log;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Evidence gathered by inspecting the pod's process tree.
    Process,
    /// Evidence gathered from the container image reference.
    Image,
    /// Evidence gathered from workload labels/annotations.
    Label,
    /// Evidence gathered by scanning ingested log lines.
    Log,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Process => write!(f, "process"),
            Source::Image => write!(f, "image"),
            Source::Label => write!(f, "label"),
            Source::Log => write!(f, "log"),
        }
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "process" => Ok(Source::Process),
            "image" => Ok(Source::Image),
            "label" => Ok(Source::Label),
            "log" => Ok(Source::Log),
            _ => Err(format!("Unknown Source: {s}")),
        }
    }
}

/// Collection status of a `(workload, source)` pair.
///
/// Transitions only along `pending -> collecting -> {collected, failed}`.
///
/// # Examples
///
/// ```
/// use detect_core::CoverageStatus;
///
/// let status = CoverageStatus::Pending;
/// assert!(!status.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageStatus {
    /// No collection attempt has run yet.
    Pending,
    /// A probe is currently gathering evidence for this source.
    Collecting,
    /// Evidence has been successfully gathered (sticky for non-log sources).
    Collected,
    /// The most recent collection attempt failed.
    Failed,
}

impl CoverageStatus {
    /// Whether this status represents a settled outcome for a non-log source.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, CoverageStatus::Collected | CoverageStatus::Failed)
    }
}

impl std::fmt::Display for CoverageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoverageStatus::Pending => write!(f, "pending"),
            CoverageStatus::Collecting => write!(f, "collecting"),
            CoverageStatus::Collected => write!(f, "collected"),
            CoverageStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Whether a piece of evidence was actively sought by a probe or passively
/// observed while scanning logs for something else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceSourceType {
    /// Collected by a probe invoked for exactly this purpose.
    Active,
    /// Observed opportunistically while the log pipeline scanned a line.
    Passive,
}

impl std::fmt::Display for EvidenceSourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvidenceSourceType::Active => write!(f, "active"),
            EvidenceSourceType::Passive => write!(f, "passive"),
        }
    }
}

/// Position of a detected framework within a multi-framework stack.
///
/// Higher layers orchestrate lower ones, e.g. Primus (wrapper) wraps
/// Megatron (base).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameworkLayer {
    /// Orchestrates one or more base frameworks (e.g. Primus, Lightning).
    Wrapper,
    /// The primary training/inference framework (e.g. Megatron, DeepSpeed, vLLM).
    Base,
    /// The underlying runtime (e.g. PyTorch) when distinguished from `base`.
    Runtime,
}

impl std::fmt::Display for FrameworkLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameworkLayer::Wrapper => write!(f, "wrapper"),
            FrameworkLayer::Base => write!(f, "base"),
            FrameworkLayer::Runtime => write!(f, "runtime"),
        }
    }
}

/// High-level nature of the workload as inferred from evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadType {
    /// The workload is training a model.
    Training,
    /// The workload is serving inference requests.
    Inference,
    /// Not enough evidence to classify.
    Unknown,
}

impl std::fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkloadType::Training => write!(f, "training"),
            WorkloadType::Inference => write!(f, "inference"),
            WorkloadType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Status of the confirmed verdict for a workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStatus {
    /// Confidence has not yet crossed the confirmation threshold.
    Pending,
    /// A verdict has been committed.
    Confirmed,
    /// Detection was abandoned (e.g. workload terminated before confirming).
    Failed,
}

impl std::fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionStatus::Pending => write!(f, "pending"),
            DetectionStatus::Confirmed => write!(f, "confirmed"),
            DetectionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The kind of a compiled pattern in the pattern registry.
///
/// Patterns within a kind are ordered by priority; `training_event` and
/// `checkpoint_event` are additionally bucketed by `subtype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Extracts a per-iteration training-performance record.
    Performance,
    /// A line that should be dropped before any other matching.
    Blacklist,
    /// Marks the start or progress of a training run (e.g. `start_training`).
    TrainingEvent,
    /// Marks a checkpoint lifecycle transition (e.g. `start_saving`).
    CheckpointEvent,
    /// Declares "this line belongs to framework X" with no field extraction.
    Identify,
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternKind::Performance => write!(f, "performance"),
            PatternKind::Blacklist => write!(f, "blacklist"),
            PatternKind::TrainingEvent => write!(f, "training_event"),
            PatternKind::CheckpointEvent => write!(f, "checkpoint_event"),
            PatternKind::Identify => write!(f, "identify"),
        }
    }
}

/// Lifecycle phase a checkpoint event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointEventType {
    /// A checkpoint save has begun.
    StartSaving,
    /// A checkpoint save has finished.
    EndSaving,
    /// A checkpoint was loaded (single-shot, no pairing needed).
    Loading,
}

impl std::fmt::Display for CheckpointEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointEventType::StartSaving => write!(f, "start_saving"),
            CheckpointEventType::EndSaving => write!(f, "end_saving"),
            CheckpointEventType::Loading => write!(f, "loading"),
        }
    }
}

/// Status of a single checkpoint event row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
    /// A `start_saving` has been observed with no matching `end_saving` yet.
    InProgress,
    /// The checkpoint completed successfully.
    Success,
    /// The checkpoint failed.
    Failed,
}

impl std::fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointStatus::InProgress => write!(f, "in_progress"),
            CheckpointStatus::Success => write!(f, "success"),
            CheckpointStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The detection coordinator's state-machine states.
///
/// # Examples
///
/// ```
/// use detect_core::CoordinatorStateKind;
///
/// let state = CoordinatorStateKind::Waiting;
/// assert!(!state.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorStateKind {
    /// Just created; about to seed coverage rows.
    Init,
    /// Idle until `next_schedule_at`, or planning the next probing round.
    Waiting,
    /// Sub-tasks dispatched; awaiting completion or timeout.
    Probing,
    /// Evaluating accumulated evidence against the confirm threshold.
    Analyzing,
    /// A verdict has been committed; about to emit follow-ups.
    Confirmed,
    /// Terminal state; no further ticks are processed.
    Completed,
}

impl CoordinatorStateKind {
    /// Whether this state is terminal (`COMPLETED`).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, CoordinatorStateKind::Completed)
    }
}

impl std::fmt::Display for CoordinatorStateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CoordinatorStateKind::Init => "INIT",
            CoordinatorStateKind::Waiting => "WAITING",
            CoordinatorStateKind::Probing => "PROBING",
            CoordinatorStateKind::Analyzing => "ANALYZING",
            CoordinatorStateKind::Confirmed => "CONFIRMED",
            CoordinatorStateKind::Completed => "COMPLETED",
        };
        write!(f, "{s}")
    }
}

/// Where a `TrainingPerformance` point came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Parsed from a stdout log line.
    Log,
    /// Pushed by an in-process exporter (e.g. a Weights & Biases shim).
    Wandb,
    /// Pushed through the generic push-telemetry ingress.
    Push,
    /// Any other source name an operator has configured upstream.
    Other(String),
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Log => write!(f, "log"),
            DataSource::Wandb => write!(f, "wandb"),
            DataSource::Push => write!(f, "push"),
            DataSource::Other(s) => write!(f, "{s}"),
        }
    }
}

impl std::str::FromStr for DataSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "log" => DataSource::Log,
            "wandb" => DataSource::Wandb,
            "push" => DataSource::Push,
            other => DataSource::Other(other.to_string()),
        })
    }
}

/// Terminal lifecycle statuses of a workload, observed by the coordinator to
/// short-circuit detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum WorkloadLifecycleStatus {
    /// Still running.
    Running,
    /// Finished without an explicit outcome tag.
    Completed,
    /// Finished with an error.
    Failed,
    /// Finished successfully.
    Succeeded,
    /// Stopped by an operator or scheduler.
    Stopped,
}

impl WorkloadLifecycleStatus {
    /// Whether this status means the coordinator should stop probing.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkloadLifecycleStatus::Completed
                | WorkloadLifecycleStatus::Failed
                | WorkloadLifecycleStatus::Succeeded
                | WorkloadLifecycleStatus::Stopped
        )
    }
}
