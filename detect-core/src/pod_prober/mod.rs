//! Pod prober facade (spec.md §4.9).
//!
//! Shared pod-selection and process-tree helpers used by the process,
//! image, and label probes.

use std::collections::HashMap;
use std::time::Duration;

use crate::storage::{ClusterApi, NodeAgentClient, ProcessInfo};
use crate::types::{PodRef, PodUid, WorkloadUid};
use crate::Result;

/// Facade combining a [`ClusterApi`] and a [`NodeAgentClient`] behind the
/// pod-selection helpers the probes need.
pub struct PodProber<'a> {
    cluster: &'a dyn ClusterApi,
    node_agent: &'a dyn NodeAgentClient,
}

impl<'a> PodProber<'a> {
    /// Wrap a cluster API and node agent client.
    pub fn new(cluster: &'a dyn ClusterApi, node_agent: &'a dyn NodeAgentClient) -> Self {
        Self { cluster, node_agent }
    }

    /// Enumerate pods for a workload and select the target: prefer one
    /// whose name ends in `-master-0`, else the lexicographically-first.
    pub async fn select_target_pod(&self, workload_uid: &WorkloadUid) -> Result<Option<PodRef>> {
        let pods = self.cluster.list_pods(workload_uid).await?;
        Ok(select_from(pods))
    }

    /// Whether the pod's workload reports a ready lifecycle status. The
    /// process probe only treats `Running` as ready.
    pub async fn is_pod_ready(&self, workload_uid: &WorkloadUid) -> Result<bool> {
        let status = self.cluster.workload_lifecycle_status(workload_uid).await?;
        Ok(status == crate::types::WorkloadLifecycleStatus::Running)
    }

    /// Age of the pod since it started running.
    pub async fn get_pod_age(&self, pod_uid: &PodUid) -> Result<Duration> {
        self.cluster.pod_age(pod_uid).await
    }

    /// Fetch the flattened process tree for a pod via the node agent.
    pub async fn get_process_tree(&self, pod_uid: &PodUid) -> Result<Vec<ProcessInfo>> {
        self.node_agent.process_tree(pod_uid).await
    }
}

/// Select the target pod from a list: prefer a `*-master-0` name, else the
/// lexicographically-first by name.
#[must_use]
pub fn select_from(mut pods: Vec<PodRef>) -> Option<PodRef> {
    if let Some(pos) = pods.iter().position(|p| p.name.ends_with("-master-0")) {
        return Some(pods.swap_remove(pos));
    }
    pods.sort_by(|a, b| a.name.cmp(&b.name));
    pods.into_iter().next()
}

/// Topmost process whose cmdline names a `python`/`python3` interpreter,
/// scanning in the order the node agent returned (parent-first).
#[must_use]
pub fn find_python_process(tree: &[ProcessInfo]) -> Option<&ProcessInfo> {
    tree.iter().find(|p| {
        let first_token = p.cmdline.split_whitespace().next().unwrap_or("");
        let binary = first_token.rsplit('/').next().unwrap_or(first_token);
        binary == "python" || binary == "python3" || binary.starts_with("python3.")
    })
}

/// Parse a process's `KEY=VALUE` environment list into a map. No-op if the
/// process already carries a structured map (the common case via
/// [`ProcessInfo::env`]), provided for parity with the node agent's raw
/// wire format.
#[must_use]
pub fn extract_env_map(raw_entries: &[String]) -> HashMap<String, String> {
    raw_entries
        .iter()
        .filter_map(|entry| entry.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod(name: &str) -> PodRef {
        PodRef { pod_uid: PodUid::new(name), name: name.to_string() }
    }

    #[test]
    fn test_select_prefers_master_0() {
        let pods = vec![pod("job-worker-1"), pod("job-master-0"), pod("job-worker-0")];
        let selected = select_from(pods).unwrap();
        assert_eq!(selected.name, "job-master-0");
    }

    #[test]
    fn test_select_falls_back_to_lexicographic_first() {
        let pods = vec![pod("job-worker-1"), pod("job-worker-0")];
        let selected = select_from(pods).unwrap();
        assert_eq!(selected.name, "job-worker-0");
    }

    #[test]
    fn test_select_empty_returns_none() {
        assert!(select_from(vec![]).is_none());
    }

    #[test]
    fn test_find_python_process_matches_interpreter_name() {
        let tree = vec![
            ProcessInfo { pid: 1, cmdline: "/bin/sh -c entrypoint.sh".to_string(), env: HashMap::new() },
            ProcessInfo { pid: 2, cmdline: "/usr/bin/python3 train.py".to_string(), env: HashMap::new() },
        ];
        let found = find_python_process(&tree).unwrap();
        assert_eq!(found.pid, 2);
    }

    #[test]
    fn test_extract_env_map() {
        let entries = vec!["PRIMUS_CONFIG=/etc/primus.yaml".to_string(), "PATH=/usr/bin".to_string()];
        let map = extract_env_map(&entries);
        assert_eq!(map.get("PRIMUS_CONFIG"), Some(&"/etc/primus.yaml".to_string()));
    }
}
