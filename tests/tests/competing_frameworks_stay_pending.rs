//! When two frameworks are evenly favored by weak corroborating signals,
//! neither dominates the aggregation and the coordinator keeps retrying
//! with backoff instead of confirming a verdict.

mod support;

use detect_core::{
    Coordinator, CoverageTracker, Evidence, EvidenceSourceType, Source, TickOutcome, WorkloadType,
    WorkloadUid,
};

use support::{FakeCluster, InMemoryStorage, RecordingDispatcher};

#[tokio::test]
async fn tied_label_evidence_keeps_retrying() {
    let workload_uid = WorkloadUid::new("wl-competing");

    let cluster = FakeCluster::new(vec![]);
    let dispatcher = RecordingDispatcher::new();
    let storage = InMemoryStorage::new();
    let config = detect_core::DetectionConfig::default();
    let coordinator = Coordinator::new(&storage, &cluster, &dispatcher, config.clone());

    coordinator.tick(&workload_uid).await.unwrap();
    let mut state = storage.get_coordinator_state(&workload_uid).await.unwrap().unwrap();
    state.next_schedule_at = chrono::Utc::now() - chrono::Duration::seconds(1);
    storage.upsert_coordinator_state(&state).await.unwrap();
    coordinator.tick(&workload_uid).await.unwrap();

    // Two equally weak, equally weighted label signals pointing at
    // different frameworks: neither dominates the score.
    let megatron = Evidence::new(
        workload_uid.clone(),
        Source::Label,
        "megatron".to_string(),
        EvidenceSourceType::Passive,
        WorkloadType::Training,
        0.6,
    );
    let deepspeed = Evidence::new(
        workload_uid.clone(),
        Source::Label,
        "deepspeed".to_string(),
        EvidenceSourceType::Passive,
        WorkloadType::Training,
        0.6,
    );
    storage.insert_evidence(&megatron).await.unwrap();
    storage.insert_evidence(&deepspeed).await.unwrap();

    let tracker = CoverageTracker::new(&storage);
    for source in [Source::Process, Source::Image, Source::Label] {
        tracker.mark_collected(&workload_uid, source, 1).await.unwrap();
    }

    assert_eq!(coordinator.tick(&workload_uid).await.unwrap(), TickOutcome::MovedToAnalyzing);
    let outcome = coordinator.tick(&workload_uid).await.unwrap();
    assert!(matches!(outcome, TickOutcome::RetryScheduled { attempt_count: 1 }));

    let state = storage.get_coordinator_state(&workload_uid).await.unwrap().unwrap();
    assert_eq!(state.attempt_count, 1);
    assert!(state.next_schedule_at > chrono::Utc::now());
    assert!(storage.get_detection(&workload_uid).await.unwrap().is_none());
    assert!(dispatcher.tasks.lock().unwrap().is_empty());
}
