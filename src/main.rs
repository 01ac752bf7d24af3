mod cli;
mod error;
mod job;
mod local_k8s;
mod report;

use std::process::ExitCode;

use kube::{Client, Config};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use tracing_subscriber::prelude::*;

use crate::cli::PodCli;
use crate::error::Error;
use crate::local_k8s::KubePods;
use crate::report::Response;

/// Logs go to stderr; stdout carries only the JSON response.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        "kube_pod_exec=debug"
    } else {
        "kube_pod_exec=warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();
}

/// Loads in-cluster (or kubeconfig) credentials and builds a client.
async fn connect() -> Result<KubePods, Error> {
    let config = Config::infer().await.map_err(Error::LoadConfig)?;
    let client = Client::try_from(config).map_err(Error::CreateClient)?;
    Ok(KubePods::new(client))
}

/// Cancels `cancel` on Ctrl-C or SIGTERM. Lookups and the exec stream both
/// watch the token, so the run ends and reports as soon as it fires.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    debug!("shutdown signal received");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match PodCli::try_new() {
        Ok(cli) => cli,
        Err(e) => return respond(&Response::failure(e)),
    };
    init_logging(cli.verbose);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let response = job::run(&cli, connect, &cancel).await;
    respond(&response)
}

fn respond(response: &Response) -> ExitCode {
    if let Err(e) = response.send() {
        error!(error = %e, "failed to write response");
        return ExitCode::FAILURE;
    }
    response.exit_code()
}
