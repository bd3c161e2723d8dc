//! Exponential backoff for the `WAITING` retry schedule (spec.md §4.5).

use std::time::Duration;

use crate::types::DetectionConfig;

/// Compute the next retry interval for a given attempt count:
/// `min(retry_interval * 2^(attempt_count - 1), max_retry_interval)`.
#[must_use]
pub fn next_retry_interval(attempt_count: u32, config: &DetectionConfig) -> Duration {
    if attempt_count == 0 {
        return config.retry_interval;
    }
    let exponent = attempt_count.saturating_sub(1).min(16);
    let scaled = config.retry_interval.as_secs_f64() * 2f64.powi(exponent as i32);
    let capped = scaled.min(config.max_retry_interval.as_secs_f64());
    Duration::from_secs_f64(capped)
}
