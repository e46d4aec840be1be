use crate::pod::PodDescriptor;
use hangar_run_model::Outcome;
use serde::Deserialize;
use std::future::Future;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClusterError {
    /// The run's namespace is left over from an earlier invocation and must be cleaned first.
    #[error("Namespace {namespace} already exists, run `clean-all-cluster` first")]
    NamespaceExists { namespace: String },
    #[error("Failed to submit {failed} of {total} scenarios: {scenarios:?}")]
    SubmissionFailed {
        failed: usize,
        total: usize,
        scenarios: Vec<String>,
    },
}

/// Lifecycle phase reported by the scheduler for a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl PodPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, PodPhase::Pending | PodPhase::Running)
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            PodPhase::Pending => Outcome::Pending,
            PodPhase::Running => Outcome::Running,
            PodPhase::Succeeded => Outcome::Success,
            PodPhase::Failed => Outcome::Failure,
            PodPhase::Unknown => Outcome::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodStatus {
    pub name: String,
    pub scenario: String,
    pub phase: PodPhase,
    /// Why the pod is in its phase, when the scheduler says
    pub reason: Option<String>,
}

/// The operations the cluster dispatcher needs from a cluster scheduler.
pub trait ClusterScheduler {
    /// Fails with [ClusterError::NamespaceExists] if the namespace is already there.
    fn create_namespace(&self, namespace: &str) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Deletes the namespace and, with it, every pod in it.
    fn delete_namespace(&self, namespace: &str) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn submit(&self, pod: &PodDescriptor) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn list_pods(
        &self,
        namespace: &str,
    ) -> impl Future<Output = anyhow::Result<Vec<PodStatus>>> + Send;

    /// Nodes available to run pods.
    fn node_count(&self) -> impl Future<Output = anyhow::Result<usize>> + Send;
}
