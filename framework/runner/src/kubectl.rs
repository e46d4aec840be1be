use crate::command::{CliCommand, CommandError};
use crate::pod::{PodDescriptor, POD_SCENARIO_ANNOTATION, POD_SCENARIO_LABEL};
use crate::scheduler::{ClusterError, ClusterScheduler, PodPhase, PodStatus};
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The cluster scheduler, driven through the `kubectl` CLI.
#[derive(Debug, Clone)]
pub struct KubectlCli {
    binary: PathBuf,
}

impl KubectlCli {
    /// Find `kubectl` on the `PATH`.
    pub fn locate() -> anyhow::Result<Self> {
        let binary = which::which("kubectl").context("Could not find `kubectl` on the PATH")?;
        log::debug!("Using cluster scheduler at {}", binary.display());

        Ok(Self { binary })
    }

    fn command(&self) -> CliCommand {
        CliCommand::new(&self.binary)
    }
}

impl ClusterScheduler for KubectlCli {
    async fn create_namespace(&self, namespace: &str) -> anyhow::Result<()> {
        match self
            .command()
            .args(["create", "namespace", namespace])
            .output()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_already_exists(&e) => Err(ClusterError::NamespaceExists {
                namespace: namespace.to_string(),
            }
            .into()),
            Err(e) => Err(anyhow::Error::from(e)
                .context(format!("Failed to create namespace {}", namespace))),
        }
    }

    async fn delete_namespace(&self, namespace: &str) -> anyhow::Result<()> {
        self.command()
            .args(["delete", "namespace", namespace])
            .output()
            .await
            .with_context(|| format!("Failed to delete namespace {}", namespace))?;

        Ok(())
    }

    async fn submit(&self, pod: &PodDescriptor) -> anyhow::Result<()> {
        let yaml = pod.to_yaml()?;
        log::trace!("Submitting pod:\n{}", yaml);

        self.command()
            .args(["apply", "-n", pod.metadata.namespace.as_str(), "-f", "-"])
            .stdin(yaml)
            .output()
            .await
            .with_context(|| format!("Failed to submit pod {}", pod.metadata.name))?;

        Ok(())
    }

    async fn list_pods(&self, namespace: &str) -> anyhow::Result<Vec<PodStatus>> {
        let out = self
            .command()
            .args(["get", "pods", "-n", namespace, "-o", "json"])
            .output()
            .await
            .with_context(|| format!("Failed to list pods in namespace {}", namespace))?;

        parse_pod_list(&out)
    }

    async fn node_count(&self) -> anyhow::Result<usize> {
        let out = self
            .command()
            .args(["get", "nodes", "-o", "json"])
            .output()
            .await
            .context("Failed to list cluster nodes")?;

        let nodes: ItemList<serde_json::Value> =
            serde_json::from_str(&out).context("Unexpected node list from kubectl")?;
        Ok(nodes.items.len())
    }
}

fn is_already_exists(error: &CommandError) -> bool {
    error
        .stderr()
        .is_some_and(|stderr| stderr.contains("AlreadyExists") || stderr.contains("already exists"))
}

#[derive(Debug, Deserialize)]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct PodItem {
    metadata: PodItemMetadata,
    #[serde(default)]
    status: Option<PodItemStatus>,
}

#[derive(Debug, Deserialize)]
struct PodItemMetadata {
    name: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodItemStatus {
    phase: Option<PodPhase>,
    /// Set by the scheduler for pod-level failures such as eviction
    reason: Option<String>,
    #[serde(default)]
    container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Deserialize)]
struct ContainerStatus {
    #[serde(default)]
    state: ContainerState,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerState {
    terminated: Option<TerminatedState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TerminatedState {
    reason: Option<String>,
    exit_code: Option<i32>,
}

impl PodItemStatus {
    /// Why the pod ended up in its phase.
    ///
    /// Container termination reasons like `OOMKilled` or `Error` come first, then the pod-level
    /// reason. A terminated container without a reason is described by its exit code.
    fn reason(&self) -> Option<String> {
        self.container_statuses
            .iter()
            .filter_map(|c| c.state.terminated.as_ref())
            .find_map(|t| match (&t.reason, t.exit_code) {
                (Some(reason), _) => Some(reason.clone()),
                (None, Some(code)) if code != 0 => Some(format!("exit code {}", code)),
                _ => None,
            })
            .or_else(|| self.reason.clone())
    }
}

fn parse_pod_list(json: &str) -> anyhow::Result<Vec<PodStatus>> {
    let list: ItemList<PodItem> =
        serde_json::from_str(json).context("Unexpected pod list from kubectl")?;

    Ok(list
        .items
        .into_iter()
        .map(|pod| {
            let status = pod.status.unwrap_or_default();
            let reason = status.reason();

            PodStatus {
                scenario: pod
                    .metadata
                    .annotations
                    .get(POD_SCENARIO_ANNOTATION)
                    .or_else(|| pod.metadata.labels.get(POD_SCENARIO_LABEL))
                    .cloned()
                    .unwrap_or_else(|| pod.metadata.name.clone()),
                name: pod.metadata.name,
                phase: status.phase.unwrap_or(PodPhase::Pending),
                reason,
            }
        })
        .collect())
}
