//! Evidence aggregator (spec.md §4.4).
//!
//! Consumes all evidence for a workload and produces a single verdict.
//! Pure function over its inputs — no I/O, so it's trivially testable and
//! safe to call synchronously from the coordinator's ANALYZING state.

mod layers;

pub use layers::{layer_for, LayerCatalogue};

use std::collections::HashMap;

use crate::constants::defaults;
use crate::types::{DetectionConfig, DetectionStatus, Evidence, FrameworkLayer, WorkloadDetection, WorkloadType};

/// The result of aggregating a workload's evidence, ready to persist as a
/// [`WorkloadDetection`].
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationOutcome {
    /// The resulting verdict.
    pub detection: WorkloadDetection,
}

/// Weight applied to a source's contribution to a framework's score.
fn source_weight(source: crate::types::Source) -> f64 {
    match source {
        crate::types::Source::Process => defaults::EVIDENCE_WEIGHT_PROCESS,
        crate::types::Source::Log => defaults::EVIDENCE_WEIGHT_LOG,
        crate::types::Source::Image => defaults::EVIDENCE_WEIGHT_IMAGE,
        crate::types::Source::Label => defaults::EVIDENCE_WEIGHT_LABEL,
    }
}

/// Aggregate a workload's evidence into a verdict, per spec.md §4.4.
#[must_use]
pub fn aggregate(
    workload_uid: crate::types::WorkloadUid,
    evidence: &[Evidence],
    config: &DetectionConfig,
) -> AggregationOutcome {
    let mut scores: HashMap<String, f64> = HashMap::new();
    let mut max_confidence: HashMap<String, f64> = HashMap::new();

    for e in evidence {
        let weighted = source_weight(e.source) * e.confidence;
        *scores.entry(e.framework.clone()).or_insert(0.0) += weighted;
        let entry = max_confidence.entry(e.framework.clone()).or_insert(0.0);
        if e.confidence > *entry {
            *entry = e.confidence;
        }
    }

    let mut ranked: Vec<(String, f64)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut detection = WorkloadDetection::pending(workload_uid);

    let Some((best_framework, best_score)) = ranked.first().cloned() else {
        return AggregationOutcome { detection };
    };
    let runner_up_score = ranked.get(1).map_or(0.0, |(_, s)| *s);

    let raw_confidence = best_score / (best_score + runner_up_score + defaults::AGGREGATOR_EPSILON);
    let floor = max_confidence.get(&best_framework).copied().unwrap_or(0.0);
    let confidence = raw_confidence.clamp(0.0, 1.0).max(floor).min(1.0);

    let workload_type = majority_workload_type(evidence, &best_framework);

    let layer = layer_for(&best_framework);
    let (top_level_framework, wrapper_framework, base_framework, frameworks) = match layer {
        FrameworkLayer::Wrapper => {
            let base = evidence
                .iter()
                .find(|e| e.framework == best_framework)
                .and_then(|e| e.base_framework.clone());
            let mut frameworks = vec![best_framework.clone()];
            if let Some(base) = &base {
                frameworks.push(base.clone());
            }
            (best_framework.clone(), Some(best_framework.clone()), base, frameworks)
        }
        _ => {
            let wrapper = evidence
                .iter()
                .find(|e| e.framework == best_framework)
                .and_then(|e| e.wrapper_framework.clone());
            let mut frameworks = vec![best_framework.clone()];
            if let Some(wrapper) = &wrapper {
                frameworks.insert(0, wrapper.clone());
            }
            let top = wrapper.clone().unwrap_or_else(|| best_framework.clone());
            (top, wrapper, Some(best_framework.clone()), frameworks)
        }
    };

    detection.framework = Some(top_level_framework);
    detection.frameworks = frameworks;
    detection.workload_type = workload_type;
    detection.confidence = confidence;
    detection.framework_layer = layer;
    detection.wrapper_framework = wrapper_framework;
    detection.base_framework = base_framework;
    detection.status = if confidence >= config.confirm_threshold && !evidence.is_empty() {
        DetectionStatus::Confirmed
    } else {
        DetectionStatus::Pending
    };
    detection.updated_at = chrono::Utc::now();

    AggregationOutcome { detection }
}

/// Majority vote over workload type, weighted by evidence score, among
/// evidence mentioning the winning framework. Ties break to `training`.
fn majority_workload_type(evidence: &[Evidence], framework: &str) -> WorkloadType {
    let mut training_score = 0.0;
    let mut inference_score = 0.0;

    for e in evidence.iter().filter(|e| e.framework == framework) {
        let weighted = source_weight(e.source) * e.confidence;
        match e.workload_type {
            WorkloadType::Training => training_score += weighted,
            WorkloadType::Inference => inference_score += weighted,
            WorkloadType::Unknown => {}
        }
    }

    if inference_score > training_score {
        WorkloadType::Inference
    } else {
        WorkloadType::Training
    }
}
