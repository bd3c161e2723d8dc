// ============================================================================
// Type Definitions
//
// This module is split into submodules for organization. All types are
// re-exported here for convenient access as `detect_core::Type`.
// ============================================================================

pub mod config;
pub mod enums;
pub mod structs;

pub use config::DetectionConfig;
pub use enums::{
    CheckpointEventType, CheckpointStatus, CoordinatorStateKind, CoverageStatus, DataSource,
    DetectionStatus, EvidenceSourceType, FrameworkLayer, PatternKind, Source, WorkloadLifecycleStatus,
    WorkloadType,
};
pub use structs::{
    CheckpointEvent, CompiledPatternRecord, CoordinatorState, DetectionCoverage, Evidence,
    Framework, FollowUpTask, GroupMap, IngestMetricsRequest, IngestMetricsResponse, LogLine,
    MetricPoint, PodRef, PodUid, TrainingPerformance, WorkloadDetection, WorkloadUid,
};
