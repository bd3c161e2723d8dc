//! End-to-end scenario: a workload is only ever observed through its log
//! output. An identify pattern produces framework evidence, and a
//! separate performance pattern produces a per-iteration training
//! telemetry row, all through [`LogPipeline::handle_line`].

mod support;

use detect_core::{LogLine, LogPipeline, PatternKind, PatternRegistry, PodUid, WorkloadUid};

use support::InMemoryStorage;

struct SingleWorkloadResolver(WorkloadUid);

impl detect_core::log_pipeline::WorkloadResolver for SingleWorkloadResolver {
    fn resolve(&self, _pod_uid: &PodUid) -> Vec<WorkloadUid> {
        vec![self.0.clone()]
    }
}

fn pattern(
    id: i64,
    kind: PatternKind,
    subtype: Option<&str>,
    regex: &str,
    framework_hint: Option<&str>,
    confidence: f64,
) -> detect_core::CompiledPatternRecord {
    detect_core::CompiledPatternRecord {
        id,
        kind,
        subtype: subtype.map(str::to_string),
        regex: regex.to_string(),
        priority: 50,
        confidence,
        framework_hint: framework_hint.map(str::to_string),
        enabled: true,
        updated_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn log_only_workload_gets_identify_evidence_and_performance_rows() {
    let workload_uid = WorkloadUid::new("wl-s3");
    let pod_uid = PodUid::new("pod-s3-0");

    let storage = InMemoryStorage::new();
    storage.seed_patterns(vec![
        pattern(
            1,
            PatternKind::Identify,
            None,
            r"Megatron-LM training run",
            Some("megatron"),
            0.8,
        ),
        pattern(
            2,
            PatternKind::Performance,
            None,
            r"iteration\s+(?P<iteration>\d+).*lm loss:\s+(?P<lm_loss>[\d.eE+-]+)",
            None,
            0.9,
        ),
    ]);

    let registry = PatternRegistry::new();
    registry.load(&storage).await.unwrap();

    let resolver = SingleWorkloadResolver(workload_uid.clone());
    let pending = detect_core::log_pipeline::PendingCheckpoints::default();
    let pipeline = LogPipeline::new(&registry, &storage, &resolver, &pending);

    let identify_line = LogLine {
        pod_uid: pod_uid.clone(),
        message: "[rank 0] Megatron-LM training run starting up".to_string(),
        log_time: chrono::Utc::now(),
    };
    let touched = pipeline.handle_line(identify_line).await.unwrap();
    assert_eq!(touched, vec![workload_uid.clone()]);

    let evidence = storage.list_evidence(&workload_uid).await.unwrap();
    assert_eq!(evidence.len(), 1);
    assert_eq!(evidence[0].framework, "megatron");
    assert_eq!(evidence[0].source, detect_core::Source::Log);
    assert_eq!(evidence[0].confidence, 0.8);

    let performance_line = LogLine {
        pod_uid: pod_uid.clone(),
        message: "iteration 126 lm loss: 6.548988E-03".to_string(),
        log_time: chrono::Utc::now(),
    };
    let touched = pipeline.handle_line(performance_line).await.unwrap();
    assert_eq!(touched, vec![workload_uid.clone()]);

    let row = storage.latest_training_performance(&workload_uid).await.unwrap().unwrap();
    assert_eq!(row.iteration, 126);
    assert_eq!(row.data_source, detect_core::DataSource::Log);
    assert_eq!(row.performance["lm_loss"], serde_json::json!(6.548988e-3));

    // A repeat of the same line is idempotent: no duplicate performance row.
    let repeat_line = LogLine {
        pod_uid,
        message: "iteration 126 lm loss: 6.548988E-03".to_string(),
        log_time: chrono::Utc::now(),
    };
    pipeline.handle_line(repeat_line).await.unwrap();
    let rows = storage.list_evidence(&workload_uid).await.unwrap();
    assert_eq!(rows.len(), 1, "no new evidence from a performance-only line");
}
