//! End-to-end scenario: a workload pushes metrics directly (no log
//! scraping involved). A second push for the same step merges into the
//! existing row and preserves the prior snapshot as a `history` entry.

mod support;

use detect_core::{
    IngestMetricsRequest, MetricPoint, PushTelemetryIngestor, WorkloadUid,
};

use support::InMemoryStorage;

struct StaticIdentityResolver;

impl detect_core::push_telemetry::WorkloadIdentityResolver for StaticIdentityResolver {
    fn resolve_by_pod_name(&self, _pod_name: &str) -> Vec<(WorkloadUid, Option<WorkloadUid>)> {
        vec![(WorkloadUid::new("wl-s4"), None)]
    }
}

#[tokio::test]
async fn second_push_for_same_step_merges_and_preserves_history() {
    let workload_uid = WorkloadUid::new("wl-s4");
    let storage = InMemoryStorage::new();
    let resolver = StaticIdentityResolver;
    let ingestor = PushTelemetryIngestor::new(&storage, &resolver);

    let t0 = chrono::Utc::now();
    let first = IngestMetricsRequest {
        workload_uid: Some(workload_uid.clone()),
        pod_uid: None,
        pod_name: None,
        run_id: "run-1".to_string(),
        metrics: vec![
            MetricPoint { name: "loss".to_string(), value: 2.5, step: 100, timestamp: t0 },
            MetricPoint { name: "lr".to_string(), value: 0.001, step: 100, timestamp: t0 },
        ],
    };
    let response = ingestor.ingest(first).await.unwrap();
    assert!(response.ok);
    assert_eq!(response.processed_count, 1);

    let row = storage.latest_training_performance(&workload_uid).await.unwrap().unwrap();
    assert_eq!(row.iteration, 100);
    assert_eq!(row.performance["loss"], serde_json::json!(2.5));
    assert!(row.performance.get("history").is_none());

    let t1 = t0 + chrono::Duration::seconds(5);
    let second = IngestMetricsRequest {
        workload_uid: Some(workload_uid.clone()),
        pod_uid: None,
        pod_name: None,
        run_id: "run-1".to_string(),
        metrics: vec![MetricPoint { name: "loss".to_string(), value: 2.3, step: 100, timestamp: t1 }],
    };
    let response = ingestor.ingest(second).await.unwrap();
    assert!(response.ok);

    let merged = storage.latest_training_performance(&workload_uid).await.unwrap().unwrap();
    assert_eq!(merged.iteration, 100);
    assert_eq!(merged.performance["loss"], serde_json::json!(2.3));
    assert_eq!(merged.data_source, detect_core::DataSource::Push);

    let history = merged.performance["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["loss"], serde_json::json!(2.5));
    assert_eq!(history[0]["lr"], serde_json::json!(0.001));
    assert!(history[0].get("history").is_none());
}

#[tokio::test]
async fn unresolvable_identity_reports_error_without_writing() {
    let storage = InMemoryStorage::new();
    struct NoMatchResolver;
    impl detect_core::push_telemetry::WorkloadIdentityResolver for NoMatchResolver {
        fn resolve_by_pod_name(&self, _pod_name: &str) -> Vec<(WorkloadUid, Option<WorkloadUid>)> {
            Vec::new()
        }
    }
    let resolver = NoMatchResolver;
    let ingestor = PushTelemetryIngestor::new(&storage, &resolver);

    let request = IngestMetricsRequest {
        workload_uid: None,
        pod_uid: None,
        pod_name: Some("unknown-pod".to_string()),
        run_id: "run-1".to_string(),
        metrics: vec![MetricPoint {
            name: "loss".to_string(),
            value: 1.0,
            step: 1,
            timestamp: chrono::Utc::now(),
        }],
    };
    let response = ingestor.ingest(request).await.unwrap();
    assert!(!response.ok);
    assert_eq!(response.processed_count, 0);
    assert!(response.error.is_some());
}
