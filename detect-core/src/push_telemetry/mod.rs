//! Push telemetry ingestion (spec.md §4.8).
//!
//! Accepts metric batches pushed by an in-process exporter running inside
//! the workload. Unlike the log pipeline, the workload here cooperates
//! directly, so no pattern matching is involved: identity resolution,
//! step-grouped aggregation, then a history-preserving upsert.

use std::collections::BTreeMap;

use crate::storage::StorageBackend;
use crate::types::{
    DataSource, IngestMetricsRequest, IngestMetricsResponse, MetricPoint, TrainingPerformance,
    WorkloadUid,
};
use crate::Result;

/// Resolves a workload identity for metrics that arrive without an
/// already-known `workload_uid`, by pod name. A pod can belong to more than
/// one workload reference (e.g. a parent job and a child sub-job); when
/// more than one match exists, the reference with no `parent_uid` ("the
/// root") is preferred, matching spec.md §4.8.
pub trait WorkloadIdentityResolver: Send + Sync {
    /// Return every `(workload_uid, parent_uid)` pair owning `pod_name`.
    fn resolve_by_pod_name(&self, pod_name: &str) -> Vec<(WorkloadUid, Option<WorkloadUid>)>;
}

/// Drives [`IngestMetricsRequest`] handling: identity resolution,
/// step-grouped aggregation, and the history-merging upsert.
pub struct PushTelemetryIngestor<'a> {
    store: &'a dyn StorageBackend,
    resolver: &'a dyn WorkloadIdentityResolver,
}

impl<'a> PushTelemetryIngestor<'a> {
    /// Wrap a storage backend and identity resolver.
    pub fn new(store: &'a dyn StorageBackend, resolver: &'a dyn WorkloadIdentityResolver) -> Self {
        Self { store, resolver }
    }

    /// Ingest one batch of pushed metrics.
    pub async fn ingest(&self, request: IngestMetricsRequest) -> Result<IngestMetricsResponse> {
        let Some(workload_uid) = self.resolve_workload(&request) else {
            return Ok(IngestMetricsResponse {
                ok: false,
                processed_count: 0,
                error: Some("could not resolve workload identity".to_string()),
            });
        };

        let existing = self.store.latest_training_performance(&workload_uid).await?;
        let serial = existing.as_ref().map_or(1, |row| row.serial);

        let grouped = group_by_step(&request.metrics, &request.run_id);
        let mut processed_count = 0;

        for (step, payload) in grouped {
            let prior = self.store.latest_training_performance(&workload_uid).await?.filter(|row| {
                row.serial == serial && row.iteration == step
            });
            let merged = merge_performance(prior, &workload_uid, &request.pod_uid, serial, step, payload);
            self.store.upsert_training_performance(&merged).await?;
            processed_count += 1;
        }

        Ok(IngestMetricsResponse { ok: true, processed_count, error: None })
    }

    fn resolve_workload(&self, request: &IngestMetricsRequest) -> Option<WorkloadUid> {
        if let Some(workload_uid) = &request.workload_uid {
            return Some(workload_uid.clone());
        }
        let pod_name = request.pod_name.as_deref()?;
        select_root_workload(self.resolver.resolve_by_pod_name(pod_name))
    }
}

/// Pick the preferred workload among candidates: the one with no
/// `parent_uid` ("the root"), else the first.
#[must_use]
pub fn select_root_workload(candidates: Vec<(WorkloadUid, Option<WorkloadUid>)>) -> Option<WorkloadUid> {
    if let Some((uid, _)) = candidates.iter().find(|(_, parent)| parent.is_none()) {
        return Some(uid.clone());
    }
    candidates.into_iter().next().map(|(uid, _)| uid)
}

/// Group metric points by training step into a `{source, run_id, step,
/// ...metric_name -> value}` payload, keyed on the earliest timestamp seen
/// per step within the batch.
#[must_use]
pub fn group_by_step(metrics: &[MetricPoint], run_id: &str) -> Vec<(u64, serde_json::Value)> {
    let mut by_step: BTreeMap<u64, (chrono::DateTime<chrono::Utc>, serde_json::Map<String, serde_json::Value>)> =
        BTreeMap::new();

    for point in metrics {
        let entry = by_step
            .entry(point.step)
            .or_insert_with(|| (point.timestamp, serde_json::Map::new()));
        if point.timestamp < entry.0 {
            entry.0 = point.timestamp;
        }
        entry.1.insert(point.name.clone(), serde_json::json!(point.value));
    }

    by_step
        .into_iter()
        .map(|(step, (earliest, mut fields))| {
            fields.insert("source".to_string(), serde_json::json!("push"));
            fields.insert("run_id".to_string(), serde_json::json!(run_id));
            fields.insert("timestamp".to_string(), serde_json::json!(earliest.to_rfc3339()));
            (step, serde_json::Value::Object(fields))
        })
        .collect()
}

/// Merge a new payload into any prior row at the same `(workload, serial,
/// step)` key: the prior payload (minus its own nested `history`) is
/// appended onto `history[]`, the new payload becomes current, and the
/// original `id`/`created_at` are preserved.
#[must_use]
pub fn merge_performance(
    prior: Option<TrainingPerformance>,
    workload_uid: &WorkloadUid,
    pod_uid: &Option<crate::types::PodUid>,
    serial: u32,
    step: u64,
    mut payload: serde_json::Value,
) -> TrainingPerformance {
    match prior {
        None => TrainingPerformance::new(
            workload_uid.clone(),
            pod_uid.clone(),
            serial,
            step,
            DataSource::Push,
            payload,
        ),
        Some(mut row) => {
            let mut prior_snapshot = row.performance.clone();
            if let Some(obj) = prior_snapshot.as_object_mut() {
                obj.remove("history");
            }

            let mut history = row
                .performance
                .get("history")
                .and_then(|h| h.as_array())
                .cloned()
                .unwrap_or_default();
            history.push(prior_snapshot);

            if let Some(obj) = payload.as_object_mut() {
                obj.insert("history".to_string(), serde_json::Value::Array(history));
            }

            row.performance = payload;
            row.data_source = DataSource::Push;
            row.updated_at = chrono::Utc::now();
            row
        }
    }
}
