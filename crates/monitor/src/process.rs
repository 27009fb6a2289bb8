//! External commands speaking JSON on stdout.
//!
//! Collaborators such as the inference model or a scripted acquisition
//! backend print free-form progress lines followed by one JSON object. The
//! last line that parses as a JSON object is the reply; on failure the
//! reply may instead be on stderr as `{"status": "error", "message": ...}`.

use crate::error::{MonitorError, Result};
use serde_json::Value;
use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Program, fixed leading arguments and a wall-clock limit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandSpec {
    /// Build from an argv-style list: the first element is the program.
    pub fn from_argv(argv: &[String], timeout: Duration) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| MonitorError::Config("command must not be empty".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }
}

/// Last line of `output` that is a JSON object.
pub fn last_json_line(output: &str) -> Option<Value> {
    output
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{') && line.ends_with('}'))
        .find_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(Value::is_object)
}

/// `message` of an error reply, if `reply` is one.
pub fn error_message(reply: &Value) -> Option<String> {
    if reply.get("status").and_then(Value::as_str) != Some("error") {
        return None;
    }
    Some(
        reply
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unspecified error")
            .to_string(),
    )
}

/// Run `spec` with `extra_args` appended and return its JSON reply.
///
/// The child is killed if the timeout elapses or the returned future is
/// dropped. A non-zero exit, an error reply or a missing reply is an error.
pub async fn run_json<I, S>(spec: &CommandSpec, extra_args: I) -> Result<Value>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let child = Command::new(&spec.program)
        .args(&spec.args)
        .args(extra_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| MonitorError::Process {
            program: spec.program.clone(),
            message: format!("cannot start: {e}"),
        })?;

    let output = tokio::time::timeout(spec.timeout, child.wait_with_output())
        .await
        .map_err(|_| MonitorError::ProcessTimeout {
            program: spec.program.clone(),
            after: spec.timeout,
        })??;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(program = %spec.program, status = ?output.status, "command finished");

    let reply = last_json_line(&stdout);
    let failure = |message: String| MonitorError::Process {
        program: spec.program.clone(),
        message,
    };

    if let Some(message) = reply.as_ref().and_then(error_message) {
        return Err(failure(message));
    }
    if !output.status.success() {
        let message = last_json_line(&stderr)
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| {
                let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
                let tail: Vec<&str> = tail.into_iter().rev().collect();
                format!("exited with {}: {}", output.status, tail.join(" | "))
            });
        return Err(failure(message));
    }

    reply.ok_or_else(|| failure("no JSON reply on stdout".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_json_line() {
        let out = "Detected change: 12.50%\n{\"a\": 1}\nsaving...\n{\"status\":\"success\",\"b\":2}\n";
        let v = last_json_line(out).unwrap();
        assert_eq!(v["b"], 2);
        assert!(last_json_line("no json here\n{broken").is_none());
        assert!(last_json_line("").is_none());
    }

    #[test]
    fn test_error_message() {
        let v: Value = serde_json::from_str(r#"{"status":"error","message":"boom"}"#).unwrap();
        assert_eq!(error_message(&v).as_deref(), Some("boom"));
        let ok: Value = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert!(error_message(&ok).is_none());
    }

    #[test]
    fn test_from_argv() {
        let spec = CommandSpec::from_argv(
            &["python3".to_string(), "infer.py".to_string()],
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(spec.program, "python3");
        assert_eq!(spec.args, vec!["infer.py"]);
        assert!(CommandSpec::from_argv(&[], Duration::from_secs(1)).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_json_reads_last_line() {
        let spec = CommandSpec::from_argv(
            &[
                "sh".into(),
                "-c".into(),
                r#"echo progress; echo '{"status":"success","value":7}'"#.into(),
            ],
            Duration::from_secs(10),
        )
        .unwrap();
        let reply = run_json(&spec, Vec::<String>::new()).await.unwrap();
        assert_eq!(reply["value"], 7);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_json_error_on_stderr() {
        let spec = CommandSpec::from_argv(
            &[
                "sh".into(),
                "-c".into(),
                r#"echo '{"status":"error","message":"Missing arguments"}' >&2; exit 1"#.into(),
            ],
            Duration::from_secs(10),
        )
        .unwrap();
        let err = run_json(&spec, Vec::<String>::new()).await.unwrap_err();
        assert!(err.to_string().contains("Missing arguments"), "{err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_json_timeout() {
        let spec = CommandSpec::from_argv(
            &["sleep".into(), "5".into()],
            Duration::from_millis(100),
        )
        .unwrap();
        let err = run_json(&spec, Vec::<String>::new()).await.unwrap_err();
        assert!(matches!(err, MonitorError::ProcessTimeout { .. }));
    }
}
