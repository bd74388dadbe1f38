use crate::executor::graph::TaskGraph;
use crate::executor::types::ExecutionTask;

/// Decides whether a task failure aborts the whole plan
pub trait CriticalityPolicy: Send + Sync {
    fn is_critical(&self, task: &ExecutionTask, graph: &TaskGraph<'_>) -> bool;
}

/// A task is critical when its priority is at least `priority_threshold`, or when more
/// than half of the other tasks depend on it directly.
#[derive(Debug, Clone, Copy)]
pub struct DefaultCriticality {
    pub priority_threshold: u8,
}

impl Default for DefaultCriticality {
    fn default() -> Self {
        Self {
            priority_threshold: 8,
        }
    }
}

impl CriticalityPolicy for DefaultCriticality {
    fn is_critical(&self, task: &ExecutionTask, graph: &TaskGraph<'_>) -> bool {
        if task.priority() >= self.priority_threshold {
            return true;
        }
        let others = graph.len().saturating_sub(1);
        graph.dependents_count(&task.id) > others / 2
    }
}
