use thiserror::Error;

use crate::executor::cancel::CancelReason;
use crate::executor::types::{ExecutionResult, TaskResult};
use crate::state::TransitionError;

/// Errors raised while validating, resolving or executing a plan
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Duplicate task ID: {0}")]
    DuplicateTaskId(String),

    #[error("Dependency edge references unknown task '{0}'")]
    UnknownTask(String),

    #[error("Dependency not found: task '{task_id}' depends on '{missing_dep}'")]
    DependencyNotFound {
        task_id: String,
        missing_dep: String,
    },

    #[error("Circular dependency detected at task '{task_id}': {path}")]
    CircularDependency { task_id: String, path: String },

    #[error("Task '{task_id}' failed after {attempts} attempt(s): {message}")]
    TaskFailed {
        task_id: String,
        attempts: u32,
        message: String,
    },

    #[error("Critical task '{task_id}' failed: {message}")]
    CriticalTaskFailed { task_id: String, message: String },

    #[error("All {failed} executed task(s) failed")]
    AllTasksFailed { failed: usize },

    #[error("Execution cancelled: {0}")]
    Cancelled(CancelReason),

    #[error("Invalid status transition: {0}")]
    Transition(#[from] TransitionError),
}

impl ExecutorError {
    /// Detected before any task ran; never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPlan(_)
                | Self::DuplicateTaskId(_)
                | Self::UnknownTask(_)
                | Self::DependencyNotFound { .. }
                | Self::CircularDependency { .. }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Short machine-readable tag, used in events and audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPlan(_) => "invalid_plan",
            Self::DuplicateTaskId(_) => "duplicate_task_id",
            Self::UnknownTask(_) => "unknown_task",
            Self::DependencyNotFound { .. } => "dependency_not_found",
            Self::CircularDependency { .. } => "circular_dependency",
            Self::TaskFailed { .. } => "task_failed",
            Self::CriticalTaskFailed { .. } => "critical_task_failed",
            Self::AllTasksFailed { .. } => "all_tasks_failed",
            Self::Cancelled(_) => "cancelled",
            Self::Transition(_) => "invalid_transition",
        }
    }
}

/// A task that ended unsuccessfully, together with its fully populated result.
#[derive(Error, Debug, Clone)]
#[error("{error}")]
pub struct TaskRunError {
    pub result: Box<TaskResult>,
    #[source]
    pub error: ExecutorError,
}

/// A plan run that ended `failed` or `cancelled`. The result is always populated
/// so callers can inspect per-task outcomes.
#[derive(Error, Debug, Clone)]
#[error("{error}")]
pub struct PlanRunError {
    pub result: Box<ExecutionResult>,
    #[source]
    pub error: ExecutorError,
}

impl PlanRunError {
    pub fn new(result: ExecutionResult, error: ExecutorError) -> Self {
        Self {
            result: Box::new(result),
            error,
        }
    }

    pub fn into_parts(self) -> (ExecutionResult, ExecutorError) {
        (*self.result, self.error)
    }
}
