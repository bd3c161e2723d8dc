//! Image probe (spec.md §4.3).

use async_trait::async_trait;

use crate::constants::frameworks;
use crate::pod_prober::PodProber;
use crate::storage::{ClusterApi, NodeAgentClient};
use crate::types::{Evidence, EvidenceSourceType, WorkloadType, WorkloadUid};
use crate::Result;

use super::{dedup_by_framework, Probe, ProbeKind, ProbeOutcome};

const IMAGE_CONFIDENCE: f64 = 0.6;

/// Inspects the target pod's container image reference for known
/// framework keywords.
pub struct ImageProbe<'a> {
    cluster: &'a dyn ClusterApi,
    node_agent: &'a dyn NodeAgentClient,
}

impl<'a> ImageProbe<'a> {
    /// Wrap a cluster API and node agent client (the latter unused by this
    /// probe but kept for a uniform constructor across probes).
    pub fn new(cluster: &'a dyn ClusterApi, node_agent: &'a dyn NodeAgentClient) -> Self {
        Self { cluster, node_agent }
    }
}

#[async_trait]
impl<'a> Probe for ImageProbe<'a> {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Image
    }

    async fn run(&self, workload_uid: &WorkloadUid) -> Result<ProbeOutcome> {
        let prober = PodProber::new(self.cluster, self.node_agent);
        let Some(pod) = prober.select_target_pod(workload_uid).await? else {
            return Ok(ProbeOutcome::failure("no target pod found"));
        };

        let images = self.cluster.pod_images(&pod.pod_uid).await?;
        let mut evidence = Vec::new();
        for image in &images {
            let (name, _tag) = split_image_reference(image);
            evidence.extend(keyword_match(workload_uid, &name));
        }

        Ok(ProbeOutcome::success(dedup_by_framework(evidence)))
    }
}

/// Split an image reference into `{name, tag_or_digest}`, honouring
/// registry-with-port (`host:5000/repo:tag`) and `@sha256:` digest forms.
#[must_use]
pub fn split_image_reference(image: &str) -> (String, String) {
    if let Some((name, digest)) = image.split_once('@') {
        return (name.to_string(), digest.to_string());
    }

    // A colon after the last '/' is a tag separator; a colon before it (or
    // with no slash after) is a registry port and part of the name.
    let last_slash = image.rfind('/');
    let search_from = last_slash.map_or(0, |i| i + 1);
    match image[search_from..].rfind(':') {
        Some(rel_pos) => {
            let pos = search_from + rel_pos;
            (image[..pos].to_string(), image[pos + 1..].to_string())
        }
        None => (image.to_string(), String::new()),
    }
}

fn keyword_match(workload_uid: &WorkloadUid, name: &str) -> Vec<Evidence> {
    let lower = name.to_lowercase();
    for keyword in frameworks::INFERENCE_KEYWORDS {
        if lower.contains(keyword) {
            return vec![evidence(workload_uid, keyword, WorkloadType::Inference)];
        }
    }
    for keyword in frameworks::TRAINING_KEYWORDS {
        if lower.contains(keyword) {
            return vec![evidence(workload_uid, keyword, WorkloadType::Training)];
        }
    }
    Vec::new()
}

fn evidence(workload_uid: &WorkloadUid, framework: &str, workload_type: WorkloadType) -> Evidence {
    Evidence::new(
        workload_uid.clone(),
        crate::types::Source::Image,
        framework.to_string(),
        EvidenceSourceType::Active,
        workload_type,
        IMAGE_CONFIDENCE,
    )
}
