#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unused_self)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::borrowed_box)]
#![allow(clippy::float_cmp)]
#![allow(clippy::ref_option)]

//! # Detect Core
//!
//! Core data structures, storage contracts, and detection components for
//! identifying which AI training/inference framework a GPU workload is
//! running, without any cooperation from the workload itself.
//!
//! ## Core Concepts
//!
//! - **Evidence**: A single `(workload, source, framework)` observation
//!   produced by a probe.
//! - **Coverage**: Per-source collection status for a workload, used to
//!   decide when enough evidence has been gathered.
//! - **Detection**: The aggregated, confidence-scored verdict for a
//!   workload.
//! - **Coordinator**: The state machine driving a workload from first
//!   sight through confirmation.
//!
//! ## Module Organization
//!
//! ### Pipeline components
//! - [`registry`]: Pattern registry with hot reload (spec §4.1)
//! - [`evidence`]: Evidence recording (spec §4.2)
//! - [`coverage`]: Coverage tracking (spec §4.3)
//! - [`probes`]: Process/image/label/log probes (spec §4.4)
//! - [`aggregator`]: Confidence scoring (spec §4.5)
//! - [`coordinator`]: Per-workload state machine (spec §4.6)
//! - [`log_pipeline`]: Log ingestion and pattern matching (spec §4.7)
//! - [`push_telemetry`]: Pushed-metrics ingestion (spec §4.8)
//! - [`pod_prober`]: Shared pod-selection helpers (spec §4.9)
//!
//! ### Support modules
//! - [`types`]: Data model shared across the pipeline
//! - [`storage`]: Storage and collaborator trait contracts
//! - [`error`]: Error taxonomy
//! - [`retry`]: Retry policy with exponential backoff
//! - [`telemetry`]: In-process metrics
//! - [`tracing`]: Structured logging helpers
//!
//! ## Error Handling
//!
//! Most functions return [`Result<T>`] for proper error handling:
//!
//! ```no_run
//! use detect_core::{Error, Result};
//!
//! async fn example() -> Result<()> {
//!     // Operations that can fail
//!     // .await?
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod constants;
pub mod coordinator;
pub mod coverage;
pub mod error;
pub mod evidence;
pub mod log_pipeline;
pub mod pod_prober;
pub mod probes;
pub mod push_telemetry;
pub mod registry;
pub mod retry;
pub mod storage;
pub mod telemetry;
pub mod tracing;
pub mod types;

pub use aggregator::{aggregate, AggregationOutcome};
pub use coordinator::{follow_up_tasks, Coordinator, TickOutcome};
pub use coverage::CoverageTracker;
pub use error::{Error, Result};
pub use evidence::EvidenceRecorder;
pub use log_pipeline::{LogPipeline, WorkloadResolver};
pub use pod_prober::PodProber;
pub use push_telemetry::{PushTelemetryIngestor, WorkloadIdentityResolver};
pub use registry::PatternRegistry;
pub use retry::{RetryConfig, RetryMetrics, RetryPolicy, Retryable};
pub use storage::{ClusterApi, NodeAgentClient, StorageBackend, TaskDispatcher};
pub use telemetry::{CounterHandle, GaugeHandle, HistogramHandle, Telemetry, TelemetryConfig, TimerHandle};
pub use types::{
    CheckpointEvent, CheckpointEventType, CheckpointStatus, CompiledPatternRecord,
    CoordinatorState, CoordinatorStateKind, CoverageStatus, DataSource, DetectionConfig,
    DetectionCoverage, DetectionStatus, Evidence, EvidenceSourceType, FollowUpTask, Framework,
    FrameworkLayer, GroupMap, IngestMetricsRequest, IngestMetricsResponse, LogLine, MetricPoint,
    PodRef, PodUid, Source, TrainingPerformance, WorkloadDetection, WorkloadLifecycleStatus,
    WorkloadType, WorkloadUid,
};
