//! Shell execution tool.
//!
//! Executes shell commands with the workspace as working directory and
//! a configurable timeout. There is no sandbox by design: the operator
//! trusts the model with their machine. The timeout is operational —
//! it keeps a runaway command from wedging a turn.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use pepebot_core::tools::{Tool, ToolContext, ToolError};

/// Default timeout when the caller does not specify one.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Execute shell commands in the workspace.
pub struct ShellExecTool {
    workspace: PathBuf,
    max_timeout: u64,
}

impl ShellExecTool {
    /// Create a shell tool with the given workspace and timeout cap.
    pub fn new(workspace: PathBuf, max_timeout: u64) -> Self {
        Self {
            workspace,
            max_timeout: max_timeout.max(1),
        }
    }
}

#[async_trait]
impl Tool for ShellExecTool {
    fn name(&self) -> &str {
        "exec_shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace and return its output."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout": {
                    "type": "number",
                    "description": "Timeout in seconds (defaults to 30)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: serde_json::Value,
    ) -> Result<String, ToolError> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArgs("missing required field: command".into()))?;

        let timeout_secs = args
            .get("timeout")
            .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f as u64)))
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .min(self.max_timeout);

        debug!(command, timeout_secs, "executing shell command");

        // Working directory falls back to the current dir when the
        // workspace has not been created yet.
        let cwd = if self.workspace.is_dir() {
            self.workspace.clone()
        } else {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        };

        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed(format!("failed to spawn shell: {e}")))?;

        // kill_on_drop reaps the child on the cancel and timeout paths,
        // where the wait future (which owns it) is dropped.
        let timeout = std::time::Duration::from_secs(timeout_secs);
        let output = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(ToolError::Cancelled),
            result = tokio::time::timeout(timeout, child.wait_with_output()) => match result {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    return Err(ToolError::ExecutionFailed(format!("command failed: {e}")))
                }
                Err(_) => return Err(ToolError::Timeout(timeout_secs)),
            },
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut text = String::new();
        if !stdout.trim().is_empty() {
            text.push_str(stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("stderr: ");
            text.push_str(stderr.trim_end());
        }
        if !output.status.success() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&format!("exit status: {}", output.status));
        }
        if text.is_empty() {
            text = "(no output)".into();
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> (ShellExecTool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (ShellExecTool::new(dir.path().to_path_buf(), 300), dir)
    }

    #[tokio::test]
    async fn runs_command_and_captures_stdout() {
        let (tool, _dir) = tool();
        let ctx = ToolContext::default();
        let out = tool
            .execute(&ctx, json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn captures_stderr_and_exit_status() {
        let (tool, _dir) = tool();
        let ctx = ToolContext::default();
        let out = tool
            .execute(&ctx, json!({"command": "echo oops >&2; exit 3"}))
            .await
            .unwrap();
        assert!(out.contains("stderr: oops"));
        assert!(out.contains("exit status"));
    }

    #[tokio::test]
    async fn missing_command_rejected() {
        let (tool, _dir) = tool();
        let ctx = ToolContext::default();
        let err = tool.execute(&ctx, json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs(_)));
    }

    #[tokio::test]
    async fn timeout_kills_runaway_command() {
        let (tool, _dir) = tool();
        let ctx = ToolContext::default();
        let err = tool
            .execute(&ctx, json!({"command": "sleep 30", "timeout": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout(1)));
    }

    #[tokio::test]
    async fn cancellation_stops_command() {
        let (tool, _dir) = tool();
        let ctx = ToolContext::default();
        ctx.cancel.cancel();
        let err = tool
            .execute(&ctx, json!({"command": "sleep 30"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Cancelled));
    }

    #[tokio::test]
    async fn runs_in_workspace_directory() {
        let (tool, dir) = tool();
        let ctx = ToolContext::default();
        let out = tool.execute(&ctx, json!({"command": "pwd"})).await.unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(
            std::path::PathBuf::from(out).canonicalize().unwrap(),
            canonical
        );
    }

    #[tokio::test]
    async fn empty_output_placeholder() {
        let (tool, _dir) = tool();
        let ctx = ToolContext::default();
        let out = tool.execute(&ctx, json!({"command": "true"})).await.unwrap();
        assert_eq!(out, "(no output)");
    }
}
