//! Label probe (spec.md §4.3).

use async_trait::async_trait;

use crate::constants::frameworks;
use crate::pod_prober::PodProber;
use crate::storage::{ClusterApi, NodeAgentClient};
use crate::types::{Evidence, EvidenceSourceType, FrameworkLayer, WorkloadType, WorkloadUid};
use crate::Result;

use super::{dedup_by_framework, Probe, ProbeKind, ProbeOutcome};

const WELL_KNOWN_KEYS: &[&str] = &["app.kubernetes.io/name", "app", "component"];
const TRAINING_OPERATOR_KEYS: &[&str] = &["pytorchjob", "mpijob"];

/// All known framework identifiers, used for substring-matching label
/// values. Mirrors the training/inference keyword tables but treated as a
/// single flat vocabulary for label matching.
fn framework_vocabulary() -> impl Iterator<Item = &'static str> {
    frameworks::TRAINING_KEYWORDS
        .iter()
        .chain(frameworks::INFERENCE_KEYWORDS.iter())
        .copied()
}

/// Inspects a pod's labels and annotations for framework signals.
pub struct LabelProbe<'a> {
    cluster: &'a dyn ClusterApi,
    node_agent: &'a dyn NodeAgentClient,
}

impl<'a> LabelProbe<'a> {
    /// Wrap a cluster API and node agent client (the latter unused by this
    /// probe but kept for a uniform constructor across probes).
    pub fn new(cluster: &'a dyn ClusterApi, node_agent: &'a dyn NodeAgentClient) -> Self {
        Self { cluster, node_agent }
    }
}

#[async_trait]
impl<'a> Probe for LabelProbe<'a> {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Label
    }

    async fn run(&self, workload_uid: &WorkloadUid) -> Result<ProbeOutcome> {
        let prober = PodProber::new(self.cluster, self.node_agent);
        let Some(pod) = prober.select_target_pod(workload_uid).await? else {
            return Ok(ProbeOutcome::failure("no target pod found"));
        };

        let labels = self.cluster.pod_labels(&pod.pod_uid).await?;
        let evidence = match_labels(workload_uid, &labels);
        Ok(ProbeOutcome::success(dedup_by_framework(evidence)))
    }
}

/// Match a label/annotation map against the known-key and framework
/// vocabularies, assigning confidence 0.5-0.8 depending on how specific
/// the matched key is.
#[must_use]
pub fn match_labels(
    workload_uid: &WorkloadUid,
    labels: &std::collections::HashMap<String, String>,
) -> Vec<Evidence> {
    let mut rows = Vec::new();

    for (key, value) in labels {
        let lower_key = key.to_lowercase();
        let lower_value = value.to_lowercase();

        let is_operator_key = TRAINING_OPERATOR_KEYS.iter().any(|k| lower_key.contains(k));
        let is_framework_key = lower_key.contains("framework");
        let is_well_known = WELL_KNOWN_KEYS.contains(&lower_key.as_str());

        if !is_operator_key && !is_framework_key && !is_well_known {
            continue;
        }

        for framework in framework_vocabulary() {
            if lower_value.contains(framework) {
                let confidence = if is_framework_key {
                    0.8
                } else if is_operator_key {
                    0.7
                } else {
                    0.5
                };
                let workload_type = if frameworks::INFERENCE_KEYWORDS.contains(&framework) {
                    WorkloadType::Inference
                } else {
                    WorkloadType::Training
                };
                let layer = if frameworks::WRAPPER_SET.contains(&framework) {
                    FrameworkLayer::Wrapper
                } else {
                    FrameworkLayer::Base
                };
                let mut row = Evidence::new(
                    workload_uid.clone(),
                    crate::types::Source::Label,
                    framework.to_string(),
                    EvidenceSourceType::Active,
                    workload_type,
                    confidence,
                );
                row.framework_layer = layer;
                rows.push(row);
            }
        }
    }

    rows
}
