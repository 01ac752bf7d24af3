mod cluster;
pub mod exec;
pub mod pods;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;

pub use cluster::KubePods;

/// Errors returned by the cluster when querying pods.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("pods \"{0}\" not found")]
    NotFound(String),

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

/// Coarse lifecycle state of a pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
    Other(String),
}

impl From<&str> for PodPhase {
    fn from(phase: &str) -> Self {
        match phase {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            "Unknown" => PodPhase::Unknown,
            other => PodPhase::Other(other.to_string()),
        }
    }
}

/// Snapshot of a pod at query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodCandidate {
    pub name: String,
    pub phase: PodPhase,
}

impl PodCandidate {
    pub fn new(name: impl Into<String>, phase: PodPhase) -> Self {
        Self {
            name: name.into(),
            phase,
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == PodPhase::Running
    }
}

impl From<&Pod> for PodCandidate {
    fn from(pod: &Pod) -> Self {
        let phase = pod
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .map(PodPhase::from)
            .unwrap_or(PodPhase::Unknown);
        Self::new(pod.name_any(), phase)
    }
}

/// Where a command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecTarget {
    pub namespace: String,
    pub pod: String,
    pub container: Option<String>,
}

/// Whatever came back over an exec channel, before classification.
#[derive(Debug, Default)]
pub struct RawExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// Final status reported by the remote side, if any.
    pub status: Option<RemoteStatus>,
    /// Set when the stream could not be established or broke mid-way.
    pub transport_error: Option<String>,
}

/// Final status of a remote process, as reported on the exec channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStatus {
    pub success: bool,
    pub message: Option<String>,
}

/// Pod lookups against the cluster.
#[async_trait]
pub trait PodQuery: Send + Sync {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<PodCandidate, ClusterError>;

    /// Pods matching `selector`, in the order the API returned them.
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<PodCandidate>, ClusterError>;
}

/// Runs a command inside a pod and streams back its output.
#[async_trait]
pub trait RemoteExec: Send + Sync {
    async fn exec(&self, target: &ExecTarget, command: &[String]) -> RawExecOutput;
}
