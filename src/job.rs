use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::PodCli;
use crate::error::Error;
use crate::local_k8s::exec::{exec_in_pod, ExecutionResult};
use crate::local_k8s::{pods, ExecTarget, PodQuery, RemoteExec};
use crate::report::Response;

/// Validates the flags, connects, finds a running pod and runs the command
/// in it. `connect` is only called once the flags are known to be usable.
pub async fn run<C, F, Fut>(cli: &PodCli, connect: F, cancel: &CancellationToken) -> Response
where
    C: PodQuery + RemoteExec,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<C, Error>>,
{
    match try_run(cli, connect, cancel).await {
        Ok(result) => Response::from(result),
        Err(e) => Response::failure(e),
    }
}

async fn try_run<C, F, Fut>(
    cli: &PodCli,
    connect: F,
    cancel: &CancellationToken,
) -> Result<ExecutionResult, Error>
where
    C: PodQuery + RemoteExec,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<C, Error>>,
{
    let selector = cli.selector()?;
    let cluster = connect().await?;

    debug!(
        namespace = %cli.namespace,
        ?selector,
        wait = ?cli.wait_timeout,
        "looking up running pod"
    );
    let pod = pods::resolve(&cluster, &cli.namespace, &selector, cli.wait_timeout, cancel).await?;

    let target = ExecTarget {
        namespace: cli.namespace.clone(),
        pod,
        container: selector.container().map(str::to_string),
    };
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::ExecCancelled),
        result = exec_in_pod(&cluster, &target, &cli.command, cli.fail_on) => Ok(result),
    }
}
