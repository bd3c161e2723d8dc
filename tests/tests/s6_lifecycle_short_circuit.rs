//! A workload that finishes (or fails) while detection is still in
//! progress should not keep being probed forever: once the cluster
//! reports a terminal lifecycle status, the next tick short-circuits
//! straight to `COMPLETED` regardless of what state it was in.

mod support;

use detect_core::{Coordinator, TickOutcome, WorkloadLifecycleStatus, WorkloadUid};

use support::{FakeCluster, InMemoryStorage, RecordingDispatcher};

#[tokio::test]
async fn terminal_lifecycle_short_circuits_from_waiting() {
    let workload_uid = WorkloadUid::new("wl-s6a");

    let cluster = FakeCluster::new(vec![]);
    let dispatcher = RecordingDispatcher::new();
    let storage = InMemoryStorage::new();
    let config = detect_core::DetectionConfig::default();
    let coordinator = Coordinator::new(&storage, &cluster, &dispatcher, config);

    assert_eq!(coordinator.tick(&workload_uid).await.unwrap(), TickOutcome::Initialized);

    cluster.set_lifecycle(WorkloadLifecycleStatus::Succeeded);

    let outcome = coordinator.tick(&workload_uid).await.unwrap();
    assert_eq!(outcome, TickOutcome::ShortCircuited);

    let state = storage.get_coordinator_state(&workload_uid).await.unwrap().unwrap();
    assert_eq!(state.coordinator_state, detect_core::CoordinatorStateKind::Completed);
    assert!(state.coordinator_state.is_terminal());

    // Once COMPLETED, subsequent ticks are a no-op.
    assert_eq!(coordinator.tick(&workload_uid).await.unwrap(), TickOutcome::AlreadyCompleted);
    assert!(dispatcher.tasks.lock().unwrap().is_empty());
}

#[tokio::test]
async fn terminal_lifecycle_short_circuits_mid_probe() {
    let workload_uid = WorkloadUid::new("wl-s6b");

    let cluster = FakeCluster::new(vec![]);
    let dispatcher = RecordingDispatcher::new();
    let storage = InMemoryStorage::new();
    let config = detect_core::DetectionConfig::default();
    let coordinator = Coordinator::new(&storage, &cluster, &dispatcher, config);

    coordinator.tick(&workload_uid).await.unwrap();
    let mut state = storage.get_coordinator_state(&workload_uid).await.unwrap().unwrap();
    state.next_schedule_at = chrono::Utc::now() - chrono::Duration::seconds(1);
    storage.upsert_coordinator_state(&state).await.unwrap();

    let outcome = coordinator.tick(&workload_uid).await.unwrap();
    assert!(matches!(outcome, TickOutcome::Probing(_)));

    cluster.set_lifecycle(WorkloadLifecycleStatus::Failed);

    let outcome = coordinator.tick(&workload_uid).await.unwrap();
    assert_eq!(outcome, TickOutcome::ShortCircuited);

    let state = storage.get_coordinator_state(&workload_uid).await.unwrap().unwrap();
    assert_eq!(state.coordinator_state, detect_core::CoordinatorStateKind::Completed);
    assert!(storage.get_detection(&workload_uid).await.unwrap().is_none());
}
