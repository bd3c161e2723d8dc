//! Pure planning logic: which probes to run next, per spec.md §4.5.

use crate::probes::ProbeKind;
use crate::types::{CoverageStatus, DetectionConfig, DetectionCoverage, Source};

/// One entry in a planning cycle's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedProbe {
    /// Which probe kind to run.
    pub kind: ProbeKind,
    /// Which coverage source this corresponds to.
    pub source: Source,
}

/// Decide which sources still need probing this cycle, ordered by
/// descending [`ProbeKind::priority`]. Process-probe pod-readiness gating
/// (age, existence) is applied by the caller, which has cluster access;
/// this function only consults already-known coverage state.
#[must_use]
pub fn planned_sources(
    coverage: &[DetectionCoverage],
    attempt_count: u32,
    config: &DetectionConfig,
) -> Vec<PlannedProbe> {
    let mut planned = Vec::new();

    for source in [Source::Process, Source::Log, Source::Image, Source::Label] {
        let row = coverage.iter().find(|c| c.source == source);
        let settled = row.is_some_and(|r| r.is_settled(config.max_attempt_count));
        let collecting = row.is_some_and(|r| r.status == CoverageStatus::Collecting);

        if settled || collecting {
            continue;
        }

        if source != Source::Log && attempt_count >= config.max_attempt_count {
            continue;
        }

        if source == Source::Log {
            let has_window = row.is_some_and(|r| crate::coverage::uncovered_log_window(r).is_some());
            if !has_window {
                continue;
            }
        }

        let kind = match source {
            Source::Process => ProbeKind::Process,
            Source::Log => ProbeKind::LogBackfill,
            Source::Image => ProbeKind::Image,
            Source::Label => ProbeKind::Label,
        };
        planned.push(PlannedProbe { kind, source });
    }

    planned.sort_by(|a, b| b.kind.priority().cmp(&a.kind.priority()));
    planned
}
