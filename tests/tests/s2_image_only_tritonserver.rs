//! End-to-end scenario: the only signal is a serving image reference
//! (`tritonserver`), with no cooperative process signals at all. A single
//! uncontested framework candidate is still enough to confirm, but since
//! `tritonserver` isn't a wrapper config, confirmation does not dispatch a
//! follow-up task.

mod support;

use std::collections::HashMap;
use std::time::Duration;

use detect_core::storage::ProcessInfo;
use detect_core::{Coordinator, CoverageTracker, Source, TickOutcome, WorkloadType, WorkloadUid};

use support::{FakeCluster, FakeNodeAgent, InMemoryStorage, RecordingDispatcher, ScriptedPod};

#[tokio::test]
async fn image_only_inference_evidence_confirms_without_follow_up() {
    let workload_uid = WorkloadUid::new("wl-s2");
    let pod = ScriptedPod {
        pod_uid: detect_core::PodUid::new("serve-0"),
        name: "serve-0".to_string(),
        images: vec!["registry.example.com/tritonserver:24.05-py3".to_string()],
        labels: HashMap::new(),
        age: Duration::from_secs(300),
    };

    let cluster = FakeCluster::new(vec![pod.clone()]);
    // Nothing useful in the process tree: a shell entrypoint only.
    let mut trees = HashMap::new();
    trees.insert(
        pod.pod_uid.clone(),
        vec![ProcessInfo { pid: 1, cmdline: "/bin/sh -c entrypoint.sh".to_string(), env: HashMap::new() }],
    );
    let node_agent = FakeNodeAgent::new(trees);
    let dispatcher = RecordingDispatcher::new();
    let storage = InMemoryStorage::new();
    let config = detect_core::DetectionConfig::default();

    let coordinator = Coordinator::new(&storage, &cluster, &dispatcher, config.clone());
    coordinator.tick(&workload_uid).await.unwrap();

    let mut state = storage.get_coordinator_state(&workload_uid).await.unwrap().unwrap();
    state.next_schedule_at = chrono::Utc::now() - chrono::Duration::seconds(1);
    storage.upsert_coordinator_state(&state).await.unwrap();

    let outcome = coordinator.tick(&workload_uid).await.unwrap();
    let TickOutcome::Probing(_) = outcome else { panic!("expected Probing, got {outcome:?}") };

    let image_probe = detect_core::probes::ImageProbe::new(&cluster, &node_agent);
    let image_result = detect_core::probes::Probe::run(&image_probe, &workload_uid).await.unwrap();
    assert_eq!(image_result.evidence.len(), 1);
    assert_eq!(image_result.evidence[0].framework, "tritonserver");
    assert_eq!(image_result.evidence[0].workload_type, WorkloadType::Inference);
    assert_eq!(image_result.evidence[0].confidence, 0.6);
    for e in &image_result.evidence {
        storage.insert_evidence(e).await.unwrap();
    }

    let process_probe = detect_core::probes::ProcessProbe::new(&cluster, &node_agent);
    let process_result = detect_core::probes::Probe::run(&process_probe, &workload_uid).await.unwrap();
    assert!(process_result.evidence.is_empty(), "shell entrypoint carries no python signal");

    let tracker = CoverageTracker::new(&storage);
    for source in [Source::Process, Source::Image, Source::Label] {
        tracker.mark_collected(&workload_uid, source, 0).await.unwrap();
    }

    assert_eq!(coordinator.tick(&workload_uid).await.unwrap(), TickOutcome::MovedToAnalyzing);
    assert_eq!(coordinator.tick(&workload_uid).await.unwrap(), TickOutcome::Confirmed);

    let detection = storage.get_detection(&workload_uid).await.unwrap().unwrap();
    assert!(detection.is_confirmed());
    assert_eq!(detection.framework.as_deref(), Some("tritonserver"));
    assert_eq!(detection.workload_type, WorkloadType::Inference);

    // The confirmed -> completed tick dispatches follow-ups; tritonserver
    // is not a known wrapper config, so none are emitted.
    coordinator.tick(&workload_uid).await.unwrap();
    assert!(dispatcher.tasks.lock().unwrap().is_empty());
}
