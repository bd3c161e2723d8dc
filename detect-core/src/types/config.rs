//! Runtime configuration for the detection pipeline.
//!
//! Configuration is assembled from environment variables at process startup
//! via [`DetectionConfig::from_env`], with every key falling back to the
//! defaults in [`crate::constants::defaults`] when unset or unparsable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::defaults;

/// Process-wide detection configuration.
///
/// Individual workloads may override a subset of these via the `ext` field
/// on [`crate::CoordinatorState`]; [`DetectionConfig::overlay`] merges such
/// an override on top of the process defaults.
///
/// # Examples
///
/// ```
/// use detect_core::DetectionConfig;
///
/// let config = DetectionConfig::default();
/// assert_eq!(config.max_attempt_count, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Delay before the first coordinator tick for a newly observed workload.
    pub initial_delay: Duration,
    /// Delay between successive `WAITING`/`PROBING` retries.
    pub retry_interval: Duration,
    /// Ceiling applied to the retry interval under backoff.
    pub max_retry_interval: Duration,
    /// Confidence required for a `WorkloadDetection` to flip to `confirmed`.
    pub confirm_threshold: f64,
    /// Minimum pod age before the process probe is allowed to run.
    pub min_pod_age: Duration,
    /// Maximum number of `ANALYZING` re-entries before giving up.
    pub max_attempt_count: u32,
    /// Timeout applied to each individual probe sub-task.
    pub sub_task_timeout: Duration,
    /// Interval between pattern registry hot-reload polls.
    pub pattern_reload_interval: Duration,
    /// Per-workload cap on buffered, not-yet-flushed metric points.
    pub metrics_buffer_per_workload: usize,
    /// How long training-performance history entries are retained, when set.
    /// `None` means the operator has not configured retention and rows are
    /// kept indefinitely.
    pub metrics_retention: Option<Duration>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            initial_delay: defaults::INITIAL_DELAY,
            retry_interval: defaults::RETRY_INTERVAL,
            max_retry_interval: defaults::MAX_RETRY_INTERVAL,
            confirm_threshold: defaults::CONFIRM_THRESHOLD,
            min_pod_age: defaults::MIN_POD_AGE,
            max_attempt_count: defaults::MAX_ATTEMPT_COUNT,
            sub_task_timeout: defaults::SUB_TASK_TIMEOUT,
            pattern_reload_interval: defaults::PATTERN_RELOAD_INTERVAL,
            metrics_buffer_per_workload: defaults::METRICS_BUFFER_PER_WORKLOAD,
            metrics_retention: None,
        }
    }
}

impl DetectionConfig {
    /// Build configuration from environment variables, falling back to
    /// [`DetectionConfig::default`] for any key that is unset or fails to
    /// parse.
    ///
    /// Recognized variables: `DETECT_INITIAL_DELAY_SECS`,
    /// `DETECT_RETRY_INTERVAL_SECS`, `DETECT_MAX_RETRY_INTERVAL_SECS`,
    /// `DETECT_CONFIRM_THRESHOLD`, `DETECT_MIN_POD_AGE_SECS`,
    /// `DETECT_MAX_ATTEMPT_COUNT`, `DETECT_SUB_TASK_TIMEOUT_SECS`,
    /// `DETECT_PATTERN_RELOAD_INTERVAL_SECS`,
    /// `DETECT_METRICS_BUFFER_PER_WORKLOAD`, `DETECT_METRICS_RETENTION_SECS`.
    #[must_use]
    pub fn from_env() -> Self {
        let fallback = Self::default();

        Self {
            initial_delay: env_duration_secs("DETECT_INITIAL_DELAY_SECS", fallback.initial_delay),
            retry_interval: env_duration_secs(
                "DETECT_RETRY_INTERVAL_SECS",
                fallback.retry_interval,
            ),
            max_retry_interval: env_duration_secs(
                "DETECT_MAX_RETRY_INTERVAL_SECS",
                fallback.max_retry_interval,
            ),
            confirm_threshold: env_clamped_f64(
                "DETECT_CONFIRM_THRESHOLD",
                fallback.confirm_threshold,
                0.0,
                1.0,
            ),
            min_pod_age: env_duration_secs("DETECT_MIN_POD_AGE_SECS", fallback.min_pod_age),
            max_attempt_count: env_u32("DETECT_MAX_ATTEMPT_COUNT", fallback.max_attempt_count),
            sub_task_timeout: env_duration_secs(
                "DETECT_SUB_TASK_TIMEOUT_SECS",
                fallback.sub_task_timeout,
            ),
            pattern_reload_interval: env_duration_secs(
                "DETECT_PATTERN_RELOAD_INTERVAL_SECS",
                fallback.pattern_reload_interval,
            ),
            metrics_buffer_per_workload: env_usize(
                "DETECT_METRICS_BUFFER_PER_WORKLOAD",
                fallback.metrics_buffer_per_workload,
            ),
            metrics_retention: std::env::var("DETECT_METRICS_RETENTION_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs),
        }
    }

    /// Merge a per-workload `ext` JSON override on top of this
    /// configuration, returning a new, effective configuration. Unknown
    /// keys in `ext` are ignored; recognized keys use the same names as
    /// the `DETECT_*` environment variables, lowercased and without the
    /// `DETECT_` prefix (e.g. `"confirm_threshold"`).
    #[must_use]
    pub fn overlay(&self, ext: &serde_json::Value) -> Self {
        let mut effective = self.clone();
        let Some(obj) = ext.as_object() else {
            return effective;
        };

        if let Some(v) = obj.get("confirm_threshold").and_then(|v| v.as_f64()) {
            effective.confirm_threshold = v.clamp(0.0, 1.0);
        }
        if let Some(v) = obj.get("max_attempt_count").and_then(|v| v.as_u64()) {
            effective.max_attempt_count = v as u32;
        }
        if let Some(v) = obj.get("retry_interval_secs").and_then(|v| v.as_u64()) {
            effective.retry_interval = Duration::from_secs(v);
        }
        if let Some(v) = obj.get("sub_task_timeout_secs").and_then(|v| v.as_u64()) {
            effective.sub_task_timeout = Duration::from_secs(v);
        }

        effective
    }
}

fn env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_clamped_f64(key: &str, default: f64, min: f64, max: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| v.clamp(min, max))
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}
