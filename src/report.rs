use std::fmt::Display;
use std::io::Write;
use std::process::ExitCode;

use serde::Serialize;

use crate::local_k8s::exec::ExecutionResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

/// The single JSON line written to stdout at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    /// A failure that happened before anything ran in the pod.
    pub fn failure(err: impl Display) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            error: Some(ErrorBody {
                message: err.to_string(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }

    pub fn write_to<W: Write>(&self, mut out: W) -> anyhow::Result<()> {
        serde_json::to_writer(&mut out, self)?;
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }

    pub fn send(&self) -> anyhow::Result<()> {
        self.write_to(std::io::stdout().lock())
    }
}

impl From<ExecutionResult> for Response {
    fn from(result: ExecutionResult) -> Self {
        let error = result.error_message().map(|message| ErrorBody {
            message: message.to_string(),
        });
        Self {
            stdout: result.stdout,
            stderr: result.stderr,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_k8s::exec::Outcome;

    fn render(resp: &Response) -> String {
        let mut buf = Vec::new();
        resp.write_to(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn success_omits_error_key() {
        let resp = Response::from(ExecutionResult {
            stdout: "hello".to_string(),
            stderr: String::new(),
            outcome: Outcome::Success,
        });
        assert!(resp.is_success());
        assert_eq!(render(&resp), "{\"stdout\":\"hello\",\"stderr\":\"\"}\n");
    }

    #[test]
    fn remote_failure_keeps_output_and_message() {
        let resp = Response::from(ExecutionResult {
            stdout: "partial".to_string(),
            stderr: "boom".to_string(),
            outcome: Outcome::RemoteError("boom".to_string()),
        });
        assert!(!resp.is_success());

        let value: serde_json::Value = serde_json::from_str(&render(&resp)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "stdout": "partial",
                "stderr": "boom",
                "error": { "message": "boom" }
            })
        );
    }

    #[test]
    fn early_failure_has_empty_output() {
        let resp = Response::failure("labels and pod name all empty");
        assert_eq!(
            render(&resp),
            "{\"stdout\":\"\",\"stderr\":\"\",\"error\":{\"message\":\"labels and pod name all empty\"}}\n"
        );
    }

    #[test]
    fn output_is_escaped_on_one_line() {
        let resp = Response::from(ExecutionResult {
            stdout: "a\nb \"quoted\"".to_string(),
            stderr: String::new(),
            outcome: Outcome::Success,
        });
        let line = render(&resp);
        assert_eq!(line.lines().count(), 1);
        assert!(line.contains(r#""a\nb \"quoted\"""#));
    }
}
