use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::{
    api::{Api, AttachParams, ListParams},
    Client,
};
use tokio::io::AsyncRead;
use tracing::debug;

use super::{
    ClusterError, ExecTarget, PodCandidate, PodQuery, RawExecOutput, RemoteExec, RemoteStatus,
};

/// Pod access backed by a live cluster client.
#[derive(Clone)]
pub struct KubePods {
    client: Client,
}

impl KubePods {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl PodQuery for KubePods {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<PodCandidate, ClusterError> {
        match self.api(namespace).get_opt(name).await? {
            Some(pod) => Ok(PodCandidate::from(&pod)),
            None => Err(ClusterError::NotFound(name.to_string())),
        }
    }

    async fn list_pods(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<PodCandidate>, ClusterError> {
        let lp = ListParams::default().labels(selector);
        let pod_list = self.api(namespace).list(&lp).await?;
        Ok(pod_list.iter().map(PodCandidate::from).collect())
    }
}

#[async_trait]
impl RemoteExec for KubePods {
    async fn exec(&self, target: &ExecTarget, command: &[String]) -> RawExecOutput {
        let mut ap = AttachParams::default()
            .stdin(false)
            .stdout(true)
            .stderr(true)
            .tty(false);
        if let Some(container) = &target.container {
            ap = ap.container(container.clone());
        }

        let pods = self.api(&target.namespace);
        let mut attached = match pods.exec(&target.pod, command.to_vec(), &ap).await {
            Ok(attached) => attached,
            Err(e) => {
                return RawExecOutput {
                    transport_error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };

        let status = attached.take_status();
        let stdout = attached.stdout();
        let stderr = attached.stderr();
        let ((stdout, stdout_err), (stderr, stderr_err)) =
            tokio::join!(get_output(stdout), get_output(stderr));

        let mut transport_error = stdout_err.or(stderr_err);
        if let Err(e) = attached.join().await {
            if transport_error.is_none() {
                transport_error = Some(e.to_string());
            }
        }

        let status = match status {
            Some(status) => status.await.map(RemoteStatus::from),
            None => None,
        };
        debug!(pod = %target.pod, ?status, "exec stream closed");

        RawExecOutput {
            stdout,
            stderr,
            status,
            transport_error,
        }
    }
}

impl From<Status> for RemoteStatus {
    fn from(status: Status) -> Self {
        Self {
            success: status.status.as_deref() == Some("Success"),
            message: status.message,
        }
    }
}

/// Drains a stream into a string, keeping whatever arrived before a read error.
async fn get_output<R: AsyncRead + Unpin>(reader: Option<R>) -> (String, Option<String>) {
    let Some(reader) = reader else {
        return (String::new(), None);
    };
    let mut stream = tokio_util::io::ReaderStream::new(reader);
    let mut buf = Vec::new();
    let mut err = None;
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => buf.extend_from_slice(&bytes),
            Err(e) => {
                err = Some(e.to_string());
                break;
            }
        }
    }
    (String::from_utf8_lossy(&buf).into_owned(), err)
}
