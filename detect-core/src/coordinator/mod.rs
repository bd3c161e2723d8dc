//! Detection coordinator (spec.md §4.5).
//!
//! One persistent state machine per workload, advanced by a task
//! dispatcher at scheduled intervals via [`Coordinator::tick`].

mod backoff;
mod plan;

pub use backoff::next_retry_interval;
pub use plan::{planned_sources, PlannedProbe};

use crate::aggregator::aggregate;
use crate::coverage::CoverageTracker;
use crate::probes::ProbeKind;
use crate::storage::{ClusterApi, StorageBackend};
use crate::types::{
    CoordinatorStateKind, DetectionConfig, DetectionStatus, FollowUpTask, Source, WorkloadUid,
};
use crate::Result;

/// What happened on a single [`Coordinator::tick`] call, for logging and
/// tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A fresh coordinator state row was created.
    Initialized,
    /// Still waiting for `next_schedule_at`; no-op.
    StillWaiting,
    /// Moved into `PROBING` with the given set of planned probes.
    Probing(Vec<ProbeKind>),
    /// Sub-tasks from a prior `PROBING` entry are still in flight.
    StillProbing,
    /// Probing finished or timed out; moved to `ANALYZING`.
    MovedToAnalyzing,
    /// Verdict confirmed; moved to `CONFIRMED` then `COMPLETED`.
    Confirmed,
    /// Verdict still below threshold; rescheduled with backoff.
    RetryScheduled { attempt_count: u32 },
    /// Workload reached a terminal lifecycle status; short-circuited to
    /// `COMPLETED`.
    ShortCircuited,
    /// Already terminal; nothing to do.
    AlreadyCompleted,
}

/// Drives one workload's coordinator state machine forward by one tick.
pub struct Coordinator<'a> {
    store: &'a dyn StorageBackend,
    cluster: &'a dyn ClusterApi,
    dispatcher: &'a dyn crate::storage::TaskDispatcher,
    config: DetectionConfig,
}

impl<'a> Coordinator<'a> {
    /// Wrap the collaborators a coordinator tick needs.
    pub fn new(
        store: &'a dyn StorageBackend,
        cluster: &'a dyn ClusterApi,
        dispatcher: &'a dyn crate::storage::TaskDispatcher,
        config: DetectionConfig,
    ) -> Self {
        Self { store, cluster, dispatcher, config }
    }

    /// Advance `workload_uid`'s coordinator state by one tick.
    pub async fn tick(&self, workload_uid: &WorkloadUid) -> Result<TickOutcome> {
        let state = self.store.get_coordinator_state(workload_uid).await?;

        let mut state = match state {
            None => {
                let state = crate::types::CoordinatorState::new(workload_uid.clone());
                self.seed_coverage(workload_uid).await?;
                let mut state = state;
                state.coordinator_state = CoordinatorStateKind::Waiting;
                state.next_schedule_at = chrono::Utc::now() + self.config.initial_delay;
                self.store.upsert_coordinator_state(&state).await?;
                return Ok(TickOutcome::Initialized);
            }
            Some(state) => state,
        };

        if state.coordinator_state.is_terminal() {
            return Ok(TickOutcome::AlreadyCompleted);
        }

        let lifecycle = self.cluster.workload_lifecycle_status(workload_uid).await?;
        if lifecycle.is_terminal() {
            state.coordinator_state = CoordinatorStateKind::Completed;
            self.store.upsert_coordinator_state(&state).await?;
            return Ok(TickOutcome::ShortCircuited);
        }

        match state.coordinator_state {
            CoordinatorStateKind::Init | CoordinatorStateKind::Completed => unreachable!(),
            CoordinatorStateKind::Waiting => self.tick_waiting(workload_uid, &mut state).await,
            CoordinatorStateKind::Probing => self.tick_probing(workload_uid, &mut state).await,
            CoordinatorStateKind::Analyzing => self.tick_analyzing(workload_uid, &mut state).await,
            CoordinatorStateKind::Confirmed => self.tick_confirmed(workload_uid, &mut state).await,
        }
    }

    async fn seed_coverage(&self, workload_uid: &WorkloadUid) -> Result<()> {
        let tracker = CoverageTracker::new(self.store);
        for source in [Source::Process, Source::Image, Source::Label, Source::Log] {
            tracker.get_or_create(workload_uid, source).await?;
        }
        Ok(())
    }

    async fn tick_waiting(
        &self,
        workload_uid: &WorkloadUid,
        state: &mut crate::types::CoordinatorState,
    ) -> Result<TickOutcome> {
        if chrono::Utc::now() < state.next_schedule_at {
            return Ok(TickOutcome::StillWaiting);
        }

        let coverage = self.store.list_coverage(workload_uid).await?;
        let evidence = self.store.list_evidence(workload_uid).await?;
        let planned = plan::planned_sources(&coverage, state.attempt_count, &self.config);

        if planned.is_empty() {
            if evidence.is_empty() {
                state.next_schedule_at = chrono::Utc::now() + self.config.retry_interval;
                self.store.upsert_coordinator_state(state).await?;
                return Ok(TickOutcome::StillWaiting);
            }
            state.coordinator_state = CoordinatorStateKind::Analyzing;
            self.store.upsert_coordinator_state(state).await?;
            return Ok(TickOutcome::MovedToAnalyzing);
        }

        let kinds: Vec<ProbeKind> = planned.iter().map(|p| p.kind).collect();
        for probe in &planned {
            self.store
                .upsert_coverage(&coverage_for(workload_uid, &coverage, probe.source))
                .await?;
        }
        state.coordinator_state = CoordinatorStateKind::Probing;
        state.probing_started_at = Some(chrono::Utc::now());
        self.store.upsert_coordinator_state(state).await?;
        Ok(TickOutcome::Probing(kinds))
    }

    async fn tick_probing(
        &self,
        workload_uid: &WorkloadUid,
        state: &mut crate::types::CoordinatorState,
    ) -> Result<TickOutcome> {
        let coverage = self.store.list_coverage(workload_uid).await?;
        let still_running = coverage.iter().any(|c| c.status == crate::types::CoverageStatus::Collecting);

        let timed_out = state.probing_started_at.is_some_and(|started| {
            (chrono::Utc::now() - started).to_std().unwrap_or_default() > self.config.sub_task_timeout
        });

        // Sub-tasks still in flight and no timeout yet: stay in PROBING.
        if still_running && !timed_out {
            return Ok(TickOutcome::StillProbing);
        }

        state.probing_completed_at = Some(chrono::Utc::now());
        state.coordinator_state = CoordinatorStateKind::Analyzing;
        self.store.upsert_coordinator_state(state).await?;
        Ok(TickOutcome::MovedToAnalyzing)
    }

    async fn tick_analyzing(
        &self,
        workload_uid: &WorkloadUid,
        state: &mut crate::types::CoordinatorState,
    ) -> Result<TickOutcome> {
        let evidence = self.store.list_evidence(workload_uid).await?;
        let effective_config = self.config.overlay(&state.ext);
        let outcome = aggregate(workload_uid.clone(), &evidence, &effective_config);

        if outcome.detection.status == DetectionStatus::Confirmed {
            self.store.upsert_detection(&outcome.detection).await?;
            state.coordinator_state = CoordinatorStateKind::Confirmed;
            self.store.upsert_coordinator_state(state).await?;
            return Ok(TickOutcome::Confirmed);
        }

        state.attempt_count += 1;
        state.coordinator_state = CoordinatorStateKind::Waiting;
        let interval = next_retry_interval(state.attempt_count, &self.config);
        state.next_schedule_at = chrono::Utc::now() + interval;
        self.store.upsert_coordinator_state(state).await?;
        Ok(TickOutcome::RetryScheduled { attempt_count: state.attempt_count })
    }

    async fn tick_confirmed(
        &self,
        workload_uid: &WorkloadUid,
        state: &mut crate::types::CoordinatorState,
    ) -> Result<TickOutcome> {
        let detection = self.store.get_detection(workload_uid).await?;
        if let Some(detection) = detection {
            for task in follow_up_tasks(&detection) {
                self.dispatcher.dispatch(task).await?;
            }
        }
        state.coordinator_state = CoordinatorStateKind::Completed;
        self.store.upsert_coordinator_state(state).await?;
        Ok(TickOutcome::Confirmed)
    }
}

fn coverage_for(
    workload_uid: &WorkloadUid,
    rows: &[crate::types::DetectionCoverage],
    source: Source,
) -> crate::types::DetectionCoverage {
    let mut row = rows
        .iter()
        .find(|r| r.source == source)
        .cloned()
        .unwrap_or_else(|| crate::types::DetectionCoverage::new(workload_uid.clone(), source));
    row.status = crate::types::CoverageStatus::Collecting;
    row
}

/// Derive the follow-up tasks emitted on confirmation (spec.md §4.6): a
/// metadata-collection task for wrapper/base frameworks known to expose a
/// config file, and (implicitly, left to that task) a possible TensorBoard
/// streaming task.
#[must_use]
pub fn follow_up_tasks(detection: &crate::types::WorkloadDetection) -> Vec<FollowUpTask> {
    let Some(framework) = &detection.framework else {
        return Vec::new();
    };
    let known_configs = ["primus", "megatron", "deepspeed"];
    if !detection.frameworks.iter().any(|f| known_configs.contains(&f.as_str())) {
        return Vec::new();
    }
    vec![FollowUpTask {
        workload_uid: detection.workload_uid.clone(),
        task_type: "collect_framework_metadata".to_string(),
        payload: serde_json::json!({ "framework": framework, "frameworks": detection.frameworks }),
    }]
}
