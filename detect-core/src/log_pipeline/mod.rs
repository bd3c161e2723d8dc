//! Log pipeline hook (spec.md §4.7).
//!
//! Invoked once per log line. Strips ANSI escape sequences, resolves the
//! owning workload(s) for the source pod, checks the blacklist, then tries
//! an identify scan, a performance match, and training/checkpoint event
//! matches in turn.

mod ansi;
mod serial;

pub use ansi::strip_ansi;
pub use serial::{next_training_serial, PendingCheckpoints};

use std::collections::HashMap;

use crate::constants::defaults;
use crate::registry::PatternRegistry;
use crate::storage::StorageBackend;
use crate::types::{
    CheckpointEvent, CheckpointEventType, CheckpointStatus, DataSource, Evidence,
    EvidenceSourceType, LogLine, PodUid, Source, TrainingPerformance, WorkloadType, WorkloadUid,
};
use crate::Result;

/// Resolves the workload(s) owning a pod. A pod can be shared by more than
/// one workload reference in principle (e.g. a parent/child relationship),
/// so this returns a list.
pub trait WorkloadResolver: Send + Sync {
    /// Return every workload that owns `pod_uid`, or empty if unknown.
    fn resolve(&self, pod_uid: &PodUid) -> Vec<WorkloadUid>;
}

/// Drives a single log line through the pipeline described in spec.md §4.7.
pub struct LogPipeline<'a> {
    registry: &'a PatternRegistry,
    store: &'a dyn StorageBackend,
    resolver: &'a dyn WorkloadResolver,
    pending_checkpoints: &'a PendingCheckpoints,
}

impl<'a> LogPipeline<'a> {
    /// Wrap the pattern registry, storage backend, and workload resolver
    /// needed to process log lines.
    pub fn new(
        registry: &'a PatternRegistry,
        store: &'a dyn StorageBackend,
        resolver: &'a dyn WorkloadResolver,
        pending_checkpoints: &'a PendingCheckpoints,
    ) -> Self {
        Self { registry, store, resolver, pending_checkpoints }
    }

    /// Process one log line. Returns the workloads for which at least one
    /// write occurred (evidence, performance row, or event row), useful
    /// for tests and metrics; callers driving the live tail don't need the
    /// return value.
    pub async fn handle_line(&self, line: LogLine) -> Result<Vec<WorkloadUid>> {
        let message = strip_ansi(&line.message);
        let workloads = self.resolver.resolve(&line.pod_uid);
        if workloads.is_empty() {
            return Ok(Vec::new());
        }

        if self.registry.is_blacklisted(&message) {
            return Ok(Vec::new());
        }

        let mut touched = Vec::new();

        for workload_uid in &workloads {
            if self.maybe_identify(workload_uid, &message).await? {
                touched.push(workload_uid.clone());
            }
        }

        if let Some(outcome) = self.registry.match_performance(&message) {
            self.registry.hit(outcome.pattern_id);
            for workload_uid in &workloads {
                self.write_performance(workload_uid, &outcome, line.log_time).await?;
                touched.push(workload_uid.clone());
            }
        }

        if let Some((subtype, outcome)) = self.registry.match_training_event(&message) {
            self.registry.hit(outcome.pattern_id);
            if subtype == "start_training" {
                for workload_uid in &workloads {
                    self.record_training_start(workload_uid, &line.pod_uid, line.log_time).await?;
                    touched.push(workload_uid.clone());
                }
            }
        }

        if let Some((subtype, outcome)) = self.registry.match_checkpoint_event(&message) {
            self.registry.hit(outcome.pattern_id);
            for workload_uid in &workloads {
                self.handle_checkpoint_event(workload_uid, &subtype, &outcome, line.log_time)
                    .await?;
                touched.push(workload_uid.clone());
            }
        }

        touched.sort();
        touched.dedup();
        Ok(touched)
    }

    /// Run the pipeline in backfill mode for a historical window: only the
    /// identify step is applied (no side effects on lifecycle events),
    /// matching spec.md §4.3's log-backfill probe contract.
    pub async fn handle_line_backfill(&self, line: &LogLine) -> Result<Option<Evidence>> {
        let message = strip_ansi(&line.message);
        if self.registry.is_blacklisted(&message) {
            return Ok(None);
        }
        let Some(outcome) = self.registry.match_identify(&message) else {
            return Ok(None);
        };
        self.registry.hit(outcome.pattern_id);

        let workloads = self.resolver.resolve(&line.pod_uid);
        let Some(workload_uid) = workloads.into_iter().next() else {
            return Ok(None);
        };

        if self.already_confident(&workload_uid).await? {
            return Ok(None);
        }

        let sample: String = message.chars().take(defaults::IDENTIFY_SAMPLE_LEN).collect();
        let mut evidence = Evidence::new(
            workload_uid,
            Source::Log,
            outcome.framework_hint.clone().unwrap_or_default(),
            EvidenceSourceType::Passive,
            WorkloadType::Unknown,
            outcome.confidence,
        );
        evidence.payload = serde_json::json!({ "sample": sample });
        Ok(Some(evidence))
    }

    async fn maybe_identify(&self, workload_uid: &WorkloadUid, message: &str) -> Result<bool> {
        if self.already_confident(workload_uid).await? {
            return Ok(false);
        }
        let Some(outcome) = self.registry.match_identify(message) else {
            return Ok(false);
        };
        self.registry.hit(outcome.pattern_id);

        let sample: String = message.chars().take(defaults::IDENTIFY_SAMPLE_LEN).collect();
        let mut evidence = Evidence::new(
            workload_uid.clone(),
            Source::Log,
            outcome.framework_hint.clone().unwrap_or_default(),
            EvidenceSourceType::Passive,
            WorkloadType::Unknown,
            outcome.confidence,
        );
        evidence.payload = serde_json::json!({ "sample": sample });
        self.store.insert_evidence(&evidence).await?;
        Ok(true)
    }

    async fn already_confident(&self, workload_uid: &WorkloadUid) -> Result<bool> {
        Ok(self
            .store
            .get_detection(workload_uid)
            .await?
            .is_some_and(|d| d.confidence >= defaults::IDENTIFY_CONFIDENCE_FLOOR))
    }

    async fn write_performance(
        &self,
        workload_uid: &WorkloadUid,
        outcome: &crate::registry::MatchOutcome,
        log_time: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let existing = self.store.latest_training_performance(workload_uid).await?;
        let serial = existing.as_ref().map_or(1, |row| row.serial);
        let iteration = outcome
            .groups
            .get("iteration")
            .or_else(|| outcome.groups.get("current_iteration"))
            .and_then(|v| v.parse::<u64>().ok());

        let Some(iteration) = iteration else {
            return Ok(());
        };

        // Idempotence: log source never overwrites an existing row for
        // this key (push has precedence, spec.md §4.7/§4.8).
        if existing.as_ref().is_some_and(|e| e.iteration == iteration && e.serial == serial) {
            return Ok(());
        }

        let mut performance = serde_json::Map::new();
        for (key, value) in &outcome.groups {
            if key == "iteration" || key == "current_iteration" {
                continue;
            }
            if let Ok(n) = value.parse::<f64>() {
                performance.insert(key.clone(), serde_json::json!(n));
            }
        }
        performance.insert("timestamp".to_string(), serde_json::json!(log_time.to_rfc3339()));

        let row = TrainingPerformance::new(
            workload_uid.clone(),
            None,
            serial,
            iteration,
            DataSource::Log,
            serde_json::Value::Object(performance),
        );
        self.store.upsert_training_performance(&row).await
    }

    async fn record_training_start(
        &self,
        workload_uid: &WorkloadUid,
        pod_uid: &PodUid,
        log_time: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let existing = self.store.latest_training_performance(workload_uid).await?;
        let serial = next_training_serial(existing.as_ref().map(|e| e.serial));
        let row = TrainingPerformance::new(
            workload_uid.clone(),
            Some(pod_uid.clone()),
            serial,
            0,
            DataSource::Log,
            serde_json::json!({ "event": "start_training", "time": log_time.to_rfc3339() }),
        );
        self.store.upsert_training_performance(&row).await
    }

    async fn handle_checkpoint_event(
        &self,
        workload_uid: &WorkloadUid,
        subtype: &str,
        outcome: &crate::registry::MatchOutcome,
        log_time: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let iteration = outcome
            .groups
            .get("iteration")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        match subtype {
            "start_saving" => {
                let path = outcome.groups.get("checkpoint_path").cloned().unwrap_or_default();
                let event = CheckpointEvent::start_saving(workload_uid.clone(), iteration, path);
                self.pending_checkpoints.insert(event.pending_key(), log_time);
                self.store.upsert_checkpoint_event(&event).await
            }
            "end_saving" => {
                let key = (workload_uid.clone(), iteration);
                let start_time = self.pending_checkpoints.take(&key).unwrap_or(log_time);
                let duration_ms = outcome
                    .groups
                    .get("duration_ms")
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or_else(|| (log_time - start_time).num_milliseconds().max(0) as u64);
                let event = CheckpointEvent {
                    workload_uid: workload_uid.clone(),
                    iteration,
                    event_type: CheckpointEventType::EndSaving,
                    checkpoint_path: outcome.groups.get("checkpoint_path").cloned(),
                    start_time,
                    end_time: Some(log_time),
                    duration_ms: Some(duration_ms),
                    is_fast_ckpt: outcome.groups.contains_key("fast_ckpt"),
                    status: CheckpointStatus::Success,
                    metadata: serde_json::Value::Object(serde_json::Map::new()),
                };
                self.store.upsert_checkpoint_event(&event).await
            }
            "loading" => {
                let event = CheckpointEvent {
                    workload_uid: workload_uid.clone(),
                    iteration,
                    event_type: CheckpointEventType::Loading,
                    checkpoint_path: outcome.groups.get("checkpoint_path").cloned(),
                    start_time: log_time,
                    end_time: Some(log_time),
                    duration_ms: None,
                    is_fast_ckpt: false,
                    status: CheckpointStatus::Success,
                    metadata: serde_json::Value::Object(serde_json::Map::new()),
                };
                self.store.upsert_checkpoint_event(&event).await
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticResolver(HashMap<String, Vec<WorkloadUid>>);

    impl WorkloadResolver for StaticResolver {
        fn resolve(&self, pod_uid: &PodUid) -> Vec<WorkloadUid> {
            self.0.get(pod_uid.as_str()).cloned().unwrap_or_default()
        }
    }

    #[test]
    fn test_resolver_returns_empty_for_unknown_pod() {
        let resolver = StaticResolver(HashMap::new());
        assert!(resolver.resolve(&PodUid::new("unknown")).is_empty());
    }
}
