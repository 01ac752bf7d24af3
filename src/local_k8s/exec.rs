use tracing::{info, warn};

use super::{ExecTarget, RawExecOutput, RemoteExec};

/// Decides when a command that streamed cleanly still counts as failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Any output on stderr is a failure.
    #[default]
    Stderr,
    /// Only a `Failure` status on the exec channel is a failure.
    ExitStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    RemoteError(String),
    TransportError(String),
}

/// Trimmed output of a remote command and how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub outcome: Outcome,
}

impl ExecutionResult {
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success => None,
            Outcome::RemoteError(msg) | Outcome::TransportError(msg) => Some(msg),
        }
    }
}

/// Runs `command` once in the target pod. Never retried: the command may
/// have side effects.
pub async fn exec_in_pod<E: RemoteExec + ?Sized>(
    exec: &E,
    target: &ExecTarget,
    command: &[String],
    policy: FailurePolicy,
) -> ExecutionResult {
    info!(
        namespace = %target.namespace,
        pod = %target.pod,
        container = target.container.as_deref().unwrap_or_default(),
        ?command,
        "executing command in pod"
    );
    let result = classify(exec.exec(target, command).await, policy);
    if let Some(msg) = result.error_message() {
        warn!(pod = %target.pod, error = %msg, "command failed");
    }
    result
}

fn classify(raw: RawExecOutput, policy: FailurePolicy) -> ExecutionResult {
    let stdout = raw.stdout.trim().to_string();
    let stderr = raw.stderr.trim().to_string();

    let outcome = if let Some(cause) = raw.transport_error {
        Outcome::TransportError(cause)
    } else {
        match policy {
            FailurePolicy::Stderr if !stderr.is_empty() => Outcome::RemoteError(stderr.clone()),
            FailurePolicy::ExitStatus => match raw.status {
                Some(status) if !status.success => Outcome::RemoteError(
                    status
                        .message
                        .unwrap_or_else(|| "command terminated with failure status".to_string()),
                ),
                _ => Outcome::Success,
            },
            _ => Outcome::Success,
        }
    };

    ExecutionResult {
        stdout,
        stderr,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::local_k8s::RemoteStatus;

    /// Hands back a canned exec output and remembers what it was asked to run.
    struct StubExec {
        output: Mutex<Option<RawExecOutput>>,
        seen: Mutex<Vec<(ExecTarget, Vec<String>)>>,
    }

    impl StubExec {
        fn new(output: RawExecOutput) -> Self {
            Self {
                output: Mutex::new(Some(output)),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RemoteExec for StubExec {
        async fn exec(&self, target: &ExecTarget, command: &[String]) -> RawExecOutput {
            self.seen
                .lock()
                .unwrap()
                .push((target.clone(), command.to_vec()));
            self.output.lock().unwrap().take().unwrap_or_default()
        }
    }

    fn target() -> ExecTarget {
        ExecTarget {
            namespace: "jobs".to_string(),
            pod: "mysql-0".to_string(),
            container: Some("mysql".to_string()),
        }
    }

    fn cmd(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn output(stdout: &str, stderr: &str) -> RawExecOutput {
        RawExecOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn clean_run_is_success() {
        let stub = StubExec::new(output("hello\n", ""));
        let command = cmd(&["echo", "hello"]);
        let res = exec_in_pod(&stub, &target(), &command, FailurePolicy::Stderr).await;

        assert_eq!(res.stdout, "hello");
        assert_eq!(res.stderr, "");
        assert_eq!(res.outcome, Outcome::Success);
        assert_eq!(res.error_message(), None);

        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (target(), command));
    }

    #[tokio::test]
    async fn stderr_output_is_a_remote_failure() {
        let stub = StubExec::new(output("partial", "boom\n"));
        let res = exec_in_pod(&stub, &target(), &cmd(&["false"]), FailurePolicy::Stderr).await;

        assert_eq!(res.stdout, "partial");
        assert_eq!(res.stderr, "boom");
        assert_eq!(res.outcome, Outcome::RemoteError("boom".to_string()));
        assert_eq!(res.error_message(), Some("boom"));
    }

    #[tokio::test]
    async fn failed_stream_reports_transport_error() {
        let stub = StubExec::new(RawExecOutput {
            transport_error: Some("failed to upgrade connection".to_string()),
            ..Default::default()
        });
        let res = exec_in_pod(&stub, &target(), &cmd(&["ls"]), FailurePolicy::Stderr).await;

        assert_eq!(res.stdout, "");
        assert_eq!(res.stderr, "");
        assert_eq!(
            res.outcome,
            Outcome::TransportError("failed to upgrade connection".to_string())
        );
    }

    #[tokio::test]
    async fn transport_error_wins_over_stderr_and_keeps_partial_output() {
        let mut raw = output("half a line", "warning: slow disk");
        raw.transport_error = Some("connection reset by peer".to_string());
        let stub = StubExec::new(raw);
        let res = exec_in_pod(&stub, &target(), &cmd(&["ls"]), FailurePolicy::Stderr).await;

        assert_eq!(res.stdout, "half a line");
        assert_eq!(res.stderr, "warning: slow disk");
        assert_eq!(res.error_message(), Some("connection reset by peer"));
    }

    #[tokio::test]
    async fn output_is_trimmed() {
        let stub = StubExec::new(output("\n  row 1\nrow 2\n\n", " \t\n"));
        let command = cmd(&["cat", "rows"]);
        let res = exec_in_pod(&stub, &target(), &command, FailurePolicy::Stderr).await;

        assert_eq!(res.stdout, "row 1\nrow 2");
        assert_eq!(res.stderr, "");
        assert_eq!(res.outcome, Outcome::Success);
    }

    #[tokio::test]
    async fn exit_status_policy_ignores_stderr_on_success() {
        let mut raw = output("done", "deprecated flag");
        raw.status = Some(RemoteStatus {
            success: true,
            message: None,
        });
        let stub = StubExec::new(raw);
        let res = exec_in_pod(&stub, &target(), &cmd(&["job"]), FailurePolicy::ExitStatus).await;

        assert_eq!(res.outcome, Outcome::Success);
        assert_eq!(res.stderr, "deprecated flag");
    }

    #[tokio::test]
    async fn exit_status_policy_reports_failure_status() {
        let mut raw = output("", "");
        raw.status = Some(RemoteStatus {
            success: false,
            message: Some("command terminated with non-zero exit code: 3".to_string()),
        });
        let stub = StubExec::new(raw);
        let res = exec_in_pod(&stub, &target(), &cmd(&["job"]), FailurePolicy::ExitStatus).await;

        assert_eq!(
            res.error_message(),
            Some("command terminated with non-zero exit code: 3")
        );
    }
}
