use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use cadence_core::api::{ExecutionTask, ResolvedContext, TaskExecutor, TaskOutput};

/// Task parameter holding the shell command line
pub const COMMAND_PARAM: &str = "command";
/// Task parameter overriding the timeout, in seconds
pub const TIMEOUT_PARAM: &str = "timeout_secs";

const TAIL_CHARS: usize = 400;

/// Runs a task's `command` parameter through the platform shell.
///
/// The task id and the resolved context (as JSON) are passed in the environment as
/// `CADENCE_TASK_ID` and `CADENCE_CONTEXT`. Stdout becomes the task output, parsed as
/// JSON when possible. A non-zero exit fails the attempt with the tail of stderr; an
/// expired timeout fails it with a message containing `timeout`.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn timeout_for(&self, task: &ExecutionTask) -> Duration {
        task.context
            .parameters
            .get(TIMEOUT_PARAM)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.timeout)
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

fn shell(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command_line);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command_line);
        cmd
    }
}

/// Last `TAIL_CHARS` characters, trimmed
fn tail(s: &str) -> &str {
    let s = s.trim();
    let skip = s.chars().count().saturating_sub(TAIL_CHARS);
    match s.char_indices().nth(skip) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

#[async_trait]
impl TaskExecutor for CommandExecutor {
    fn name(&self) -> &str {
        "command"
    }

    fn available_tools(&self) -> Vec<String> {
        vec!["shell".to_string()]
    }

    #[tracing::instrument(name = "command.execute", skip_all, fields(task_id = %task.id))]
    async fn execute(&self, task: &ExecutionTask, context: &ResolvedContext) -> Result<TaskOutput> {
        let Some(command_line) = task.context.parameters.get(COMMAND_PARAM) else {
            anyhow::bail!("task '{}' has no '{}' parameter", task.id, COMMAND_PARAM);
        };
        let timeout = self.timeout_for(task);
        let context_json = serde_json::to_string(context)?;

        tracing::debug!(command = %command_line, timeout_secs = timeout.as_secs(), "spawning command");
        let child = shell(command_line)
            .env("CADENCE_TASK_ID", &task.id)
            .env("CADENCE_CONTEXT", context_json)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn command for task '{}'", task.id))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output.context("failed to collect command output")?,
            Err(_) => anyhow::bail!(
                "command timeout after {}s: {}",
                timeout.as_secs(),
                command_line
            ),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            anyhow::bail!("command exited with {}: {}", code, tail(&stderr));
        }

        let trimmed = stdout.trim();
        let value = serde_json::from_str::<Value>(trimmed)
            .unwrap_or_else(|_| Value::String(trimmed.to_string()));

        Ok(TaskOutput {
            output: value,
            tools_used: self.available_tools(),
            confidence: 1.0,
            ..Default::default()
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn task(command: &str) -> ExecutionTask {
        ExecutionTask::new("t", "shell").with_parameter(COMMAND_PARAM, command)
    }

    #[tokio::test]
    async fn captures_stdout() {
        let out = CommandExecutor::default()
            .execute(&task("echo hello"), &ResolvedContext::new())
            .await
            .unwrap();
        assert_eq!(out.output, "hello");
        assert_eq!(out.tools_used, vec!["shell"]);
    }

    #[tokio::test]
    async fn parses_json_stdout() {
        let out = CommandExecutor::default()
            .execute(&task(r#"echo '{"n": 2}'"#), &ResolvedContext::new())
            .await
            .unwrap();
        assert_eq!(out.output["n"], 2);
    }

    #[tokio::test]
    async fn passes_context_in_environment() {
        let mut ctx = ResolvedContext::new();
        ctx.insert("inline:a".into(), Value::String("b".into()));
        let out = CommandExecutor::default()
            .execute(&task("printf '%s' \"$CADENCE_CONTEXT\""), &ctx)
            .await
            .unwrap();
        assert_eq!(out.output["inline:a"], "b");
    }

    #[tokio::test]
    async fn non_zero_exit_reports_stderr() {
        let err = CommandExecutor::default()
            .execute(&task("echo boom >&2; exit 3"), &ResolvedContext::new())
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("exited with 3"));
        assert!(message.contains("boom"));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let task = task("sleep 5").with_parameter(TIMEOUT_PARAM, "0");
        let err = CommandExecutor::default()
            .execute(&task, &ResolvedContext::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[tokio::test]
    async fn missing_command_fails() {
        let err = CommandExecutor::default()
            .execute(&ExecutionTask::new("t", "shell"), &ResolvedContext::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no 'command' parameter"));
    }

    #[test]
    fn tail_keeps_the_end() {
        let long = "x".repeat(1000) + "END";
        let t = tail(&long);
        assert!(t.ends_with("END"));
        assert_eq!(t.chars().count(), TAIL_CHARS);
    }
}
