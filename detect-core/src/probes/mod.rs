//! Source probes (spec.md §4.3).
//!
//! All probes share the same contract: input is a `workload_uid`, output
//! is zero-or-more [`Evidence`] rows and a terminal [`CoverageStatus`]
//! transition. Probes must be idempotent — a repeat execution either adds
//! nothing new or safely refreshes the last row.

mod image;
mod label;
mod log_backfill;
mod process;

pub use image::ImageProbe;
pub use label::LabelProbe;
pub use log_backfill::LogBackfillProbe;
pub use process::ProcessProbe;

use async_trait::async_trait;

use crate::types::{Evidence, WorkloadUid};
use crate::Result;

/// Which probe produced a given plan entry or result; used for logging and
/// for the coordinator's planning priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    /// Process tree inspection (spec.md §4.3, priority 100).
    Process,
    /// Backfill log scan (spec.md §4.3, priority 80).
    LogBackfill,
    /// Container image reference inspection (spec.md §4.3, priority 60).
    Image,
    /// Pod labels/annotations inspection (spec.md §4.3, priority 40).
    Label,
}

impl ProbeKind {
    /// Planning priority, descending order wins (spec.md §4.5).
    #[must_use]
    pub fn priority(self) -> i32 {
        match self {
            ProbeKind::Process => 100,
            ProbeKind::LogBackfill => 80,
            ProbeKind::Image => 60,
            ProbeKind::Label => 40,
        }
    }
}

/// The outcome of running a probe: any evidence produced, plus whether the
/// run should be treated as a terminal success or failure for coverage
/// purposes.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// Evidence rows produced by this run.
    pub evidence: Vec<Evidence>,
    /// Error message if the probe failed outright (coverage -> `failed`).
    pub error: Option<String>,
}

impl ProbeOutcome {
    /// A successful outcome with the given evidence (possibly empty).
    #[must_use]
    pub fn success(evidence: Vec<Evidence>) -> Self {
        Self { evidence, error: None }
    }

    /// A failed outcome.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self { evidence: Vec::new(), error: Some(error.into()) }
    }

    /// Whether this outcome represents a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Shared interface implemented by each concrete probe.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Which kind of probe this is.
    fn kind(&self) -> ProbeKind;

    /// Run the probe for a workload, producing evidence and/or a failure.
    async fn run(&self, workload_uid: &WorkloadUid) -> Result<ProbeOutcome>;
}

/// Deduplicate evidence rows produced within a single probe invocation by
/// `(source, framework)`, keeping the highest-confidence row per key.
#[must_use]
pub fn dedup_by_framework(rows: Vec<Evidence>) -> Vec<Evidence> {
    let mut by_key: std::collections::HashMap<(crate::types::Source, String), Evidence> =
        std::collections::HashMap::new();
    for row in rows {
        let key = (row.source, row.framework.clone());
        match by_key.get(&key) {
            Some(existing) if existing.confidence >= row.confidence => {}
            _ => {
                by_key.insert(key, row);
            }
        }
    }
    by_key.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EvidenceSourceType, Source, WorkloadType};

    #[test]
    fn test_dedup_keeps_highest_confidence() {
        let workload_uid = WorkloadUid::new("w-1");
        let low = Evidence::new(
            workload_uid.clone(),
            Source::Process,
            "primus".to_string(),
            EvidenceSourceType::Active,
            WorkloadType::Training,
            0.5,
        );
        let high = Evidence::new(
            workload_uid,
            Source::Process,
            "primus".to_string(),
            EvidenceSourceType::Active,
            WorkloadType::Training,
            0.9,
        );
        let deduped = dedup_by_framework(vec![low, high]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].confidence, 0.9);
    }

    #[test]
    fn test_probe_priority_ordering_matches_spec() {
        assert!(ProbeKind::Process.priority() > ProbeKind::LogBackfill.priority());
        assert!(ProbeKind::LogBackfill.priority() > ProbeKind::Image.priority());
        assert!(ProbeKind::Image.priority() > ProbeKind::Label.priority());
    }
}
