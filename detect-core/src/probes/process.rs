//! Process probe (spec.md §4.3).

use async_trait::async_trait;

use crate::constants::{defaults, frameworks};
use crate::pod_prober::{find_python_process, PodProber};
use crate::storage::{ClusterApi, NodeAgentClient};
use crate::types::{Evidence, EvidenceSourceType, WorkloadType, WorkloadUid};
use crate::Result;

use super::{dedup_by_framework, Probe, ProbeKind, ProbeOutcome};

const CMDLINE_CONFIDENCE: f64 = 0.75;
const ENV_WRAPPER_CONFIDENCE: f64 = 0.85;

/// Inspects the highest-rank Python process inside a pod's cgroup for
/// cmdline and environment-variable signals.
pub struct ProcessProbe<'a> {
    cluster: &'a dyn ClusterApi,
    node_agent: &'a dyn NodeAgentClient,
}

impl<'a> ProcessProbe<'a> {
    /// Wrap a cluster API and node agent client.
    pub fn new(cluster: &'a dyn ClusterApi, node_agent: &'a dyn NodeAgentClient) -> Self {
        Self { cluster, node_agent }
    }
}

#[async_trait]
impl<'a> Probe for ProcessProbe<'a> {
    fn kind(&self) -> ProbeKind {
        ProbeKind::Process
    }

    async fn run(&self, workload_uid: &WorkloadUid) -> Result<ProbeOutcome> {
        let prober = PodProber::new(self.cluster, self.node_agent);

        let Some(pod) = prober.select_target_pod(workload_uid).await? else {
            return Ok(ProbeOutcome::failure("no target pod found"));
        };

        if !prober.is_pod_ready(workload_uid).await? {
            return Ok(ProbeOutcome::success(Vec::new()));
        }

        let age = prober.get_pod_age(&pod.pod_uid).await?;
        if age < defaults::PROCESS_PROBE_MIN_POD_AGE {
            return Ok(ProbeOutcome::success(Vec::new()));
        }

        let tree = match prober.get_process_tree(&pod.pod_uid).await {
            Ok(tree) => tree,
            Err(e) => return Ok(ProbeOutcome::failure(e.to_string())),
        };

        let Some(proc) = find_python_process(&tree) else {
            return Ok(ProbeOutcome::success(Vec::new()));
        };

        let mut evidence = Vec::new();
        evidence.extend(cmdline_signals(workload_uid, &proc.cmdline));
        evidence.extend(env_signals(workload_uid, &proc.env));

        Ok(ProbeOutcome::success(dedup_by_framework(evidence)))
    }
}

fn cmdline_signals(workload_uid: &WorkloadUid, cmdline: &str) -> Vec<Evidence> {
    let lower = cmdline.to_lowercase();
    for keyword in frameworks::INFERENCE_KEYWORDS {
        if lower.contains(keyword) {
            return vec![evidence(workload_uid, keyword, WorkloadType::Inference, CMDLINE_CONFIDENCE)];
        }
    }
    for keyword in frameworks::TRAINING_KEYWORDS {
        if lower.contains(keyword) {
            return vec![evidence(workload_uid, keyword, WorkloadType::Training, CMDLINE_CONFIDENCE)];
        }
    }
    Vec::new()
}

fn env_signals(
    workload_uid: &WorkloadUid,
    env: &std::collections::HashMap<String, String>,
) -> Vec<Evidence> {
    let mut rows = Vec::new();

    if env.contains_key("PRIMUS_CONFIG") || env.contains_key("PRIMUS_VERSION") {
        let mut row = evidence(workload_uid, "primus", WorkloadType::Training, ENV_WRAPPER_CONFIDENCE);
        if let Some(backend) = env.get("PRIMUS_BACKEND") {
            row.base_framework = Some(backend.to_lowercase());
        }
        rows.push(row);
    }
    if env.contains_key("DEEPSPEED_CONFIG") || env.contains_key("DS_CONFIG") {
        rows.push(evidence(workload_uid, "deepspeed", WorkloadType::Training, ENV_WRAPPER_CONFIDENCE));
    }
    if env.contains_key("MEGATRON_CONFIG") {
        rows.push(evidence(workload_uid, "megatron", WorkloadType::Training, ENV_WRAPPER_CONFIDENCE));
    }

    rows
}

fn evidence(
    workload_uid: &WorkloadUid,
    framework: &str,
    workload_type: WorkloadType,
    confidence: f64,
) -> Evidence {
    Evidence::new(
        workload_uid.clone(),
        crate::types::Source::Process,
        framework.to_string(),
        EvidenceSourceType::Active,
        workload_type,
        confidence,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmdline_signals_prefers_inference_over_training() {
        let workload_uid = WorkloadUid::new("w-1");
        let rows = cmdline_signals(&workload_uid, "python -m vllm.entrypoints.openai.api_server");
        assert_eq!(rows[0].workload_type, WorkloadType::Inference);
    }

    #[test]
    fn test_cmdline_signals_detects_training_keyword() {
        let workload_uid = WorkloadUid::new("w-1");
        let rows = cmdline_signals(&workload_uid, "torchrun pretrain_gpt.py");
        assert_eq!(rows[0].workload_type, WorkloadType::Training);
    }

    #[test]
    fn test_env_signals_detects_primus_with_backend() {
        let workload_uid = WorkloadUid::new("w-1");
        let mut env = std::collections::HashMap::new();
        env.insert("PRIMUS_CONFIG".to_string(), "/etc/primus.yaml".to_string());
        env.insert("PRIMUS_BACKEND".to_string(), "Megatron".to_string());
        let rows = env_signals(&workload_uid, &env);
        assert_eq!(rows[0].framework, "primus");
        assert_eq!(rows[0].base_framework, Some("megatron".to_string()));
    }
}
