use std::collections::HashMap;

use async_trait::async_trait;

use crate::executor::types::{ExecutionTask, TaskOutput};

/// Context values resolved from a task's input references
pub type ResolvedContext = HashMap<String, serde_json::Value>;

/// Runs a single attempt of a task.
///
/// Errors are classified by message: the retrying executor retries an attempt when
/// the formatted error chain contains one of the configured retriable substrings.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(
        &self,
        task: &ExecutionTask,
        context: &ResolvedContext,
    ) -> anyhow::Result<TaskOutput>;

    /// Tool names the executor can invoke
    fn available_tools(&self) -> Vec<String> {
        Vec::new()
    }

    fn estimate_tokens(&self, task: &ExecutionTask) -> u32 {
        task.estimated_tokens
    }
}

/// Resolves a task's input references lazily, right before each attempt
#[async_trait]
pub trait ContextLoader: Send + Sync {
    async fn load_task_context(&self, task: &ExecutionTask) -> anyhow::Result<ResolvedContext>;
}

/// Loader for executors that need no context.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyContextLoader;

#[async_trait]
impl ContextLoader for EmptyContextLoader {
    async fn load_task_context(&self, _task: &ExecutionTask) -> anyhow::Result<ResolvedContext> {
        Ok(ResolvedContext::new())
    }
}
