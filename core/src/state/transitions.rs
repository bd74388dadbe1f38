//! Status transition rules and validation

use super::types::{ExecutionStatus, TaskStatus};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid task transition from {from} to {to}")]
    InvalidTask { from: TaskStatus, to: TaskStatus },
    #[error("Invalid plan transition from {from} to {to}")]
    InvalidPlan {
        from: ExecutionStatus,
        to: ExecutionStatus,
    },
    #[error("Cannot transition from terminal state {state}")]
    FromTerminalTask { state: TaskStatus },
    #[error("Cannot transition from terminal state {state}")]
    FromTerminalPlan { state: ExecutionStatus },
}

pub struct StateTransition;

impl StateTransition {
    /// Validate a task status change.
    ///
    /// ```text
    /// pending -> running -> completed
    ///                    -> failed
    ///                    -> retrying -> running -> ...
    ///                                -> failed
    /// pending -> blocked -> running
    /// ```
    ///
    /// A task cancelled during its backoff stays `retrying` and is dropped rather than
    /// recorded. Tasks skipped after a critical failure are recorded as `blocked`.
    pub fn validate_task(from: TaskStatus, to: TaskStatus) -> Result<(), TransitionError> {
        if Self::is_terminal_task(from) {
            return Err(TransitionError::FromTerminalTask { state: from });
        }

        let is_valid = matches!(
            (from, to),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Pending, TaskStatus::Blocked)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Blocked, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
                | (TaskStatus::Running, TaskStatus::Retrying)
                | (TaskStatus::Retrying, TaskStatus::Running)
                | (TaskStatus::Retrying, TaskStatus::Failed)
        );

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTask { from, to })
        }
    }

    /// Validate a plan status change. A plan only moves forward:
    /// pending -> running -> {completed | failed | partial | cancelled},
    /// and validation failures go straight from pending to failed.
    pub fn validate_plan(
        from: ExecutionStatus,
        to: ExecutionStatus,
    ) -> Result<(), TransitionError> {
        if Self::is_terminal_plan(from) {
            return Err(TransitionError::FromTerminalPlan { state: from });
        }

        let is_valid = match (from, to) {
            (ExecutionStatus::Pending, ExecutionStatus::Running) => true,
            (ExecutionStatus::Pending, ExecutionStatus::Failed) => true,
            (ExecutionStatus::Pending, ExecutionStatus::Cancelled) => true,
            (ExecutionStatus::Running, to) => Self::is_terminal_plan(to),
            _ => false,
        };

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidPlan { from, to })
        }
    }

    pub fn is_terminal_task(status: TaskStatus) -> bool {
        matches!(status, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn is_terminal_plan(status: ExecutionStatus) -> bool {
        matches!(
            status,
            ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::Partial
                | ExecutionStatus::Cancelled
        )
    }
}
