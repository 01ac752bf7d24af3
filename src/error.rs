use crate::local_k8s::pods::ResolveError;

/// Anything that stops a run before the command produced a result.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("labels and pod name all empty")]
    EmptySelector,

    #[error("load cluster config error: {0}")]
    LoadConfig(#[source] kube::config::InferConfigError),

    #[error("create cluster client error: {0}")]
    CreateClient(#[source] kube::Error),

    #[error("lookup running pod error: {0}")]
    Lookup(#[from] ResolveError),

    #[error("command cancelled by shutdown signal")]
    ExecCancelled,

    #[error("invalid arguments: {0}")]
    Usage(String),
}
