//! End-to-end scenario: a process probe observes `PRIMUS_CONFIG` and
//! `PRIMUS_BACKEND=Megatron` in a pod's environment, and the coordinator
//! drives the workload all the way to a confirmed detection.

mod support;

use std::collections::HashMap;
use std::time::Duration;

use detect_core::storage::ProcessInfo;
use detect_core::{Coordinator, CoverageTracker, Source, TickOutcome, WorkloadUid};

use support::{FakeCluster, FakeNodeAgent, InMemoryStorage, RecordingDispatcher, ScriptedPod};

fn primus_megatron_pod() -> (ScriptedPod, HashMap<String, String>) {
    let mut env = HashMap::new();
    env.insert("PRIMUS_CONFIG".to_string(), "/etc/primus/config.yaml".to_string());
    env.insert("PRIMUS_BACKEND".to_string(), "Megatron".to_string());
    let pod = ScriptedPod {
        pod_uid: detect_core::PodUid::new("job-abc-master-0"),
        name: "job-abc-master-0".to_string(),
        images: vec!["registry.example.com/base:latest".to_string()],
        labels: HashMap::new(),
        age: Duration::from_secs(120),
    };
    (pod, env)
}

#[tokio::test]
async fn coordinator_confirms_primus_megatron_from_process_probe() {
    let (pod, env) = primus_megatron_pod();
    let workload_uid = WorkloadUid::new("wl-s1");

    let cluster = FakeCluster::new(vec![pod.clone()]);
    let mut trees = HashMap::new();
    trees.insert(
        pod.pod_uid.clone(),
        vec![ProcessInfo { pid: 42, cmdline: "/usr/bin/python3 pretrain_gpt.py".to_string(), env }],
    );
    let node_agent = FakeNodeAgent::new(trees);
    let dispatcher = RecordingDispatcher::new();
    let storage = InMemoryStorage::new();
    let config = detect_core::DetectionConfig::default();

    let coordinator = Coordinator::new(&storage, &cluster, &dispatcher, config.clone());

    assert_eq!(coordinator.tick(&workload_uid).await.unwrap(), TickOutcome::Initialized);

    let state = storage.get_coordinator_state(&workload_uid).await.unwrap().unwrap();
    assert!(chrono::Utc::now() < state.next_schedule_at, "tick should not fire before initial_delay");

    // Force the schedule due by writing back a past timestamp, as the
    // dispatcher loop would once initial_delay elapses.
    let mut forced = state;
    forced.next_schedule_at = chrono::Utc::now() - chrono::Duration::seconds(1);
    storage.upsert_coordinator_state(&forced).await.unwrap();

    let outcome = coordinator.tick(&workload_uid).await.unwrap();
    let TickOutcome::Probing(kinds) = outcome else { panic!("expected Probing, got {outcome:?}") };
    assert!(kinds.contains(&detect_core::probes::ProbeKind::Process));

    // Run the process probe exactly as the dispatched sub-task would.
    let probe = detect_core::probes::ProcessProbe::new(&cluster, &node_agent);
    let result = detect_core::probes::Probe::run(&probe, &workload_uid).await.unwrap();
    assert!(!result.is_failure());
    assert_eq!(result.evidence.len(), 1);
    assert_eq!(result.evidence[0].framework, "primus");
    assert_eq!(result.evidence[0].base_framework.as_deref(), Some("megatron"));
    assert_eq!(result.evidence[0].confidence, 0.85);

    for e in &result.evidence {
        storage.insert_evidence(e).await.unwrap();
    }
    let tracker = CoverageTracker::new(&storage);
    for kind in &kinds {
        let source = match kind {
            detect_core::probes::ProbeKind::Process => Source::Process,
            detect_core::probes::ProbeKind::Image => Source::Image,
            detect_core::probes::ProbeKind::Label => Source::Label,
            detect_core::probes::ProbeKind::LogBackfill => Source::Log,
        };
        tracker.mark_collected(&workload_uid, source, 1).await.unwrap();
    }

    assert_eq!(coordinator.tick(&workload_uid).await.unwrap(), TickOutcome::MovedToAnalyzing);
    assert_eq!(coordinator.tick(&workload_uid).await.unwrap(), TickOutcome::Confirmed);

    let detection = storage.get_detection(&workload_uid).await.unwrap().unwrap();
    assert!(detection.is_confirmed());
    assert_eq!(detection.framework.as_deref(), Some("primus"));
    assert_eq!(detection.frameworks, vec!["primus".to_string(), "megatron".to_string()]);
    assert_eq!(detection.base_framework.as_deref(), Some("megatron"));

    // Dispatching the confirmed-state follow-up tasks is a second tick.
    assert_eq!(coordinator.tick(&workload_uid).await.unwrap(), TickOutcome::Confirmed);
    assert!(!dispatcher.tasks.lock().unwrap().is_empty());
    assert_eq!(coordinator.tick(&workload_uid).await.unwrap(), TickOutcome::AlreadyCompleted);
}
