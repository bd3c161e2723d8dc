//! A sub-task that never reports back (its coverage row stays in
//! `Collecting`) should not wedge the coordinator forever: once
//! `sub_task_timeout` has elapsed since probing started, the next tick
//! moves on to `ANALYZING` with whatever evidence actually arrived.

mod support;

use detect_core::{Coordinator, TickOutcome, WorkloadUid};

use support::{FakeCluster, InMemoryStorage, RecordingDispatcher};

#[tokio::test]
async fn stuck_sub_task_times_out_into_analyzing() {
    let workload_uid = WorkloadUid::new("wl-s5");

    let cluster = FakeCluster::new(vec![]);
    let dispatcher = RecordingDispatcher::new();
    let storage = InMemoryStorage::new();
    let config = detect_core::DetectionConfig::default();
    let coordinator = Coordinator::new(&storage, &cluster, &dispatcher, config.clone());

    assert_eq!(coordinator.tick(&workload_uid).await.unwrap(), TickOutcome::Initialized);

    let mut state = storage.get_coordinator_state(&workload_uid).await.unwrap().unwrap();
    state.next_schedule_at = chrono::Utc::now() - chrono::Duration::seconds(1);
    storage.upsert_coordinator_state(&state).await.unwrap();

    let outcome = coordinator.tick(&workload_uid).await.unwrap();
    assert!(matches!(outcome, TickOutcome::Probing(_)));

    // Nothing ever reports collected: every planned coverage row stays in
    // `Collecting`. A tick shortly after should stay PROBING...
    let outcome = coordinator.tick(&workload_uid).await.unwrap();
    assert_eq!(outcome, TickOutcome::StillProbing);

    // ...but once `sub_task_timeout` has elapsed since probing started, the
    // coordinator gives up waiting and moves on regardless of coverage.
    let mut state = storage.get_coordinator_state(&workload_uid).await.unwrap().unwrap();
    state.probing_started_at = Some(
        chrono::Utc::now()
            - chrono::Duration::from_std(config.sub_task_timeout).unwrap()
            - chrono::Duration::seconds(1),
    );
    storage.upsert_coordinator_state(&state).await.unwrap();

    let outcome = coordinator.tick(&workload_uid).await.unwrap();
    assert_eq!(outcome, TickOutcome::MovedToAnalyzing);

    // No evidence ever arrived, so analysis can't confirm anything; the
    // workload goes back to WAITING with a scheduled retry instead of
    // getting stuck.
    let outcome = coordinator.tick(&workload_uid).await.unwrap();
    assert!(matches!(outcome, TickOutcome::RetryScheduled { attempt_count: 1 }));

    let state = storage.get_coordinator_state(&workload_uid).await.unwrap().unwrap();
    assert_eq!(state.coordinator_state, detect_core::CoordinatorStateKind::Waiting);
    assert!(storage.get_detection(&workload_uid).await.unwrap().is_none());
}
