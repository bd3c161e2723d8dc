//! Global constants for detect-core
//!
//! This module centralizes all magic numbers and string constants used throughout
//! the detection pipeline, making them easier to maintain and configure.

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    // Coordinator scheduling
    pub const INITIAL_DELAY: Duration = Duration::from_secs(30);
    pub const RETRY_INTERVAL: Duration = Duration::from_secs(30);
    pub const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(60);
    pub const SUB_TASK_TIMEOUT: Duration = Duration::from_secs(60);
    pub const MIN_POD_AGE: Duration = Duration::from_secs(30);
    pub const MAX_ATTEMPT_COUNT: u32 = 5;

    // Aggregation
    pub const CONFIRM_THRESHOLD: f64 = 0.70;
    pub const AGGREGATOR_EPSILON: f64 = 1e-6;

    // Pattern registry
    pub const PATTERN_RELOAD_INTERVAL: Duration = Duration::from_secs(60);
    pub const MAX_PATTERN_LENGTH: usize = 2048;
    pub const MAX_PATTERN_REPETITION: u32 = 1000;

    // Metrics / in-memory buffers
    pub const METRICS_BUFFER_PER_WORKLOAD: usize = 10_000;

    // Retry configuration (store writes)
    pub const STORE_MAX_RETRIES: u32 = 2;
    pub const STORE_RETRY_DELAY_MS: u64 = 200;

    // Timeouts for external IO
    pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_PROCESS_TREE_TIMEOUT: Duration = Duration::from_secs(30);

    // Process probe readiness
    pub const PROCESS_PROBE_MIN_POD_AGE: Duration = Duration::from_secs(10);

    // Confidence weights
    pub const EVIDENCE_WEIGHT_PROCESS: f64 = 1.0;
    pub const EVIDENCE_WEIGHT_LOG: f64 = 0.9;
    pub const EVIDENCE_WEIGHT_IMAGE: f64 = 0.6;
    pub const EVIDENCE_WEIGHT_LABEL: f64 = 0.5;

    // Log pipeline
    pub const IDENTIFY_CONFIDENCE_FLOOR: f64 = 0.5;
    pub const IDENTIFY_SAMPLE_LEN: usize = 200;
}

/// Error messages
pub mod errors {
    pub const WORKLOAD_NOT_FOUND: &str = "Workload not found";
    pub const COVERAGE_NOT_FOUND: &str = "Coverage row not found";
    pub const EVIDENCE_NOT_FOUND: &str = "Evidence row not found";
    pub const DETECTION_NOT_FOUND: &str = "WorkloadDetection not found";
    pub const INVALID_WORKLOAD_UID: &str = "Invalid workload UID";
    pub const INVALID_POD_UID: &str = "Invalid pod UID";
    pub const STORAGE_CONNECTION_FAILED: &str = "Failed to connect to storage backend";
    pub const SERIALIZATION_FAILED: &str = "Failed to serialize data";
    pub const DESERIALIZATION_FAILED: &str = "Failed to deserialize data";
    pub const PATTERN_REGISTRY_EMPTY: &str = "Pattern registry has no usable patterns";
}

/// Log messages and prefixes
pub mod logging {
    pub const LOG_PREFIX_COORDINATOR: &str = "[COORDINATOR]";
    pub const LOG_PREFIX_PROBE: &str = "[PROBE]";
    pub const LOG_PREFIX_REGISTRY: &str = "[REGISTRY]";
    pub const LOG_PREFIX_AGGREGATOR: &str = "[AGGREGATOR]";
    pub const LOG_PREFIX_PIPELINE: &str = "[PIPELINE]";
    pub const LOG_PREFIX_TELEMETRY: &str = "[TELEMETRY]";
}

/// Database table and column names
pub mod db {
    // Table names
    pub const TABLE_COVERAGE: &str = "detection_coverage";
    pub const TABLE_EVIDENCE: &str = "evidence";
    pub const TABLE_DETECTIONS: &str = "workload_detections";
    pub const TABLE_COORDINATOR_STATE: &str = "coordinator_state";
    pub const TABLE_PATTERNS: &str = "compiled_patterns";
    pub const TABLE_TRAINING_PERFORMANCE: &str = "training_performance";
    pub const TABLE_CHECKPOINT_EVENTS: &str = "checkpoint_events";

    // Common column names
    pub const COL_ID: &str = "id";
    pub const COL_WORKLOAD_UID: &str = "workload_uid";
    pub const COL_POD_UID: &str = "pod_uid";
    pub const COL_CREATED_AT: &str = "created_at";
    pub const COL_UPDATED_AT: &str = "updated_at";
}

/// Framework vocabulary shared across probes and the layer resolver.
pub mod frameworks {
    /// Frameworks known to wrap another framework rather than run standalone.
    pub const WRAPPER_SET: &[&str] = &["primus", "lightning"];

    /// Inference-oriented cmdline/image keywords.
    pub const INFERENCE_KEYWORDS: &[&str] = &[
        "vllm.entrypoints",
        "tritonserver",
        "text-generation-launcher",
        "sglang",
    ];

    /// Training-oriented cmdline/image keywords.
    pub const TRAINING_KEYWORDS: &[&str] = &[
        "primus",
        "megatron",
        "pretrain_gpt",
        "deepspeed",
        "torch.distributed",
        "torchrun",
    ];
}

/// HTTP / client constants used by out-of-crate callers wiring up a [`crate::tracing`] layer
/// or a node-agent client's user agent string.
pub mod api {
    pub const USER_AGENT: &str = concat!("detect-core/", env!("CARGO_PKG_VERSION"));
}
