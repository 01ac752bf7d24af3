use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ClusterError, PodQuery};

/// Upper bound for a single get/list call against the API server.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause between lookup attempts while waiting for a running pod.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// How to pick the pod a command runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelector {
    ExplicitPod {
        name: String,
        container: Option<String>,
    },
    LabelSelector {
        expression: String,
        container: Option<String>,
    },
}

impl TargetSelector {
    /// Builds a selector from optional flags. An explicit pod name takes
    /// precedence over a label selector; empty strings count as absent.
    /// Returns `None` when neither is set.
    pub fn from_flags(
        pod_name: Option<&str>,
        labels: Option<&str>,
        container: Option<&str>,
    ) -> Option<Self> {
        let non_empty = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_string);
        let container = non_empty(container);
        match (non_empty(pod_name), non_empty(labels)) {
            (Some(name), _) => Some(TargetSelector::ExplicitPod { name, container }),
            (None, Some(expression)) => Some(TargetSelector::LabelSelector {
                expression,
                container,
            }),
            (None, None) => None,
        }
    }

    pub fn container(&self) -> Option<&str> {
        match self {
            TargetSelector::ExplicitPod { container, .. }
            | TargetSelector::LabelSelector { container, .. } => container.as_deref(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no running pod found")]
    NoRunningPod,

    #[error("lookup running pod timeout")]
    Timeout,

    #[error("pod lookup cancelled")]
    Cancelled,

    #[error("pod query timed out after {0:?}")]
    QueryTimeout(Duration),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Picks a running pod, polling every [`RETRY_INTERVAL`] until `wait` has
/// elapsed. A zero `wait` makes exactly one attempt and returns its result.
/// Cancelling `cancel` stops both a pending query and the pause between
/// attempts.
pub async fn resolve<Q: PodQuery + ?Sized>(
    pods: &Q,
    namespace: &str,
    selector: &TargetSelector,
    wait: Duration,
    cancel: &CancellationToken,
) -> Result<String, ResolveError> {
    if wait.is_zero() {
        return cancellable_lookup(pods, namespace, selector, cancel).await;
    }

    let start = Instant::now();
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match cancellable_lookup(pods, namespace, selector, cancel).await {
            Ok(name) => {
                info!(pod = %name, attempt, "found running pod");
                return Ok(name);
            }
            Err(ResolveError::Cancelled) => return Err(ResolveError::Cancelled),
            Err(e) => debug!(attempt, error = %e, "no running pod yet"),
        }
        if start.elapsed() > wait {
            return Err(ResolveError::Timeout);
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            _ = sleep(RETRY_INTERVAL) => {}
        }
    }
}

async fn cancellable_lookup<Q: PodQuery + ?Sized>(
    pods: &Q,
    namespace: &str,
    selector: &TargetSelector,
    cancel: &CancellationToken,
) -> Result<String, ResolveError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ResolveError::Cancelled),
        res = lookup_running_pod(pods, namespace, selector) => res,
    }
}

/// A single lookup attempt.
pub async fn lookup_running_pod<Q: PodQuery + ?Sized>(
    pods: &Q,
    namespace: &str,
    selector: &TargetSelector,
) -> Result<String, ResolveError> {
    match selector {
        TargetSelector::ExplicitPod { name, .. } => {
            let pod = bounded(pods.get_pod(namespace, name)).await?;
            if pod.is_running() {
                Ok(pod.name)
            } else {
                debug!(pod = %pod.name, phase = ?pod.phase, "pod not running");
                Err(ResolveError::NoRunningPod)
            }
        }
        TargetSelector::LabelSelector { expression, .. } => {
            let candidates = bounded(pods.list_pods(namespace, expression)).await?;
            candidates
                .into_iter()
                .find(|pod| pod.is_running())
                .map(|pod| pod.name)
                .ok_or(ResolveError::NoRunningPod)
        }
    }
}

async fn bounded<T>(
    query: impl std::future::Future<Output = Result<T, ClusterError>>,
) -> Result<T, ResolveError> {
    match timeout(QUERY_TIMEOUT, query).await {
        Ok(res) => res.map_err(ResolveError::from),
        Err(_) => Err(ResolveError::QueryTimeout(QUERY_TIMEOUT)),
    }
}
