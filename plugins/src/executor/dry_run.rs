use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use cadence_core::api::{ExecutionTask, ResolvedContext, TaskExecutor, TaskOutput};

/// Executor that runs nothing and echoes what it would have worked with.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl TaskExecutor for DryRunExecutor {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn execute(&self, task: &ExecutionTask, context: &ResolvedContext) -> Result<TaskOutput> {
        tracing::debug!(task_id = %task.id, task_type = %task.task_type, "dry run");
        Ok(TaskOutput {
            output: json!({
                "task_id": task.id,
                "task_type": task.task_type,
                "description": task.description,
                "context": context,
            }),
            tokens_used: task.estimated_tokens,
            confidence: 1.0,
            ..Default::default()
        })
    }
}
