//! Log backfill probe (spec.md §4.3).

use async_trait::async_trait;

use crate::log_pipeline::{LogPipeline, PendingCheckpoints, WorkloadResolver};
use crate::registry::PatternRegistry;
use crate::storage::StorageBackend;
use crate::types::{Evidence, LogLine, WorkloadUid};
use crate::Result;

use super::{Probe, ProbeKind, ProbeOutcome};

/// Supplies historical log lines for a `[from, to]` window, used by the
/// backfill probe. A real implementation fetches from the cluster's log
/// store; tests supply canned lines.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Fetch every line for `pod_uid` within `[from, to]`, in order.
    async fn lines(
        &self,
        pod_uid: &crate::types::PodUid,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<LogLine>>;
}

/// Runs the log pipeline in backfill mode over a historical window,
/// writing Evidence for any `identify` pattern match without side effects
/// on training/checkpoint lifecycle state.
pub struct LogBackfillProbe<'a> {
    registry: &'a PatternRegistry,
    store: &'a dyn StorageBackend,
    resolver: &'a dyn WorkloadResolver,
    pending_checkpoints: &'a PendingCheckpoints,
    log_source: &'a dyn LogSource,
    pod_uid: crate::types::PodUid,
    window: (chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>),
}

impl<'a> LogBackfillProbe<'a> {
    /// Construct a backfill probe for a specific pod and `{from, to}`
    /// window, as selected by the coordinator's uncovered-window
    /// calculation (spec.md §4.5).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: &'a PatternRegistry,
        store: &'a dyn StorageBackend,
        resolver: &'a dyn WorkloadResolver,
        pending_checkpoints: &'a PendingCheckpoints,
        log_source: &'a dyn LogSource,
        pod_uid: crate::types::PodUid,
        window: (chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>),
    ) -> Self {
        Self { registry, store, resolver, pending_checkpoints, log_source, pod_uid, window }
    }
}

#[async_trait]
impl<'a> Probe for LogBackfillProbe<'a> {
    fn kind(&self) -> ProbeKind {
        ProbeKind::LogBackfill
    }

    async fn run(&self, _workload_uid: &WorkloadUid) -> Result<ProbeOutcome> {
        let pipeline = LogPipeline::new(self.registry, self.store, self.resolver, self.pending_checkpoints);
        let lines = match self.log_source.lines(&self.pod_uid, self.window.0, self.window.1).await {
            Ok(lines) => lines,
            Err(e) => return Ok(ProbeOutcome::failure(e.to_string())),
        };

        let mut evidence: Vec<Evidence> = Vec::new();
        for line in &lines {
            if let Some(row) = pipeline.handle_line_backfill(line).await? {
                evidence.push(row);
            }
        }

        Ok(ProbeOutcome::success(evidence))
    }
}
