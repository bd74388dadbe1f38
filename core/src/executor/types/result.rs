use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{ExecutionStatus, StateTransition, TaskStatus, TransitionError};

/// What a [`TaskExecutor`](crate::executor::traits::TaskExecutor) reports for one
/// successful attempt. Duration, status and timestamps are filled in by the
/// retrying executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default)]
    pub output_ref: Option<String>,
    #[serde(default)]
    pub tokens_used: u32,
    #[serde(default)]
    pub tools_used: Vec<String>,
    /// Executor confidence in the output, 0.0 to 1.0
    #[serde(default)]
    pub confidence: f64,
}

/// Result of executing a single task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default)]
    pub output_ref: Option<String>,
    pub tokens_used: u32,
    /// Wall-clock time across all attempts, including backoff waits
    pub duration_ms: u64,
    #[serde(default)]
    pub tools_used: Vec<String>,
    pub confidence: f64,
    /// Number of executor invocations
    pub attempts: u32,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskResult {
    pub fn pending(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Pending,
            output: serde_json::Value::Null,
            output_ref: None,
            tokens_used: 0,
            duration_ms: 0,
            tools_used: Vec::new(),
            confidence: 0.0,
            attempts: 0,
            error: None,
            completed_at: None,
        }
    }

    /// Move to `to`, rejecting changes the state machine does not allow.
    pub fn transition(&mut self, to: TaskStatus) -> Result<(), TransitionError> {
        StateTransition::validate_task(self.status, to)?;
        self.status = to;
        if StateTransition::is_terminal_task(to) {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn apply_output(&mut self, output: TaskOutput) {
        self.output = output.output;
        self.output_ref = output.output_ref;
        self.tokens_used = output.tokens_used;
        self.tools_used = output.tools_used;
        self.confidence = output.confidence.clamp(0.0, 1.0);
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Statistics the learning layer consumes after every plan run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefinementFeedback {
    /// successful / (successful + failed), 0.0 to 1.0
    pub success_rate: f64,
    pub failures_by_type: HashMap<String, usize>,
    pub avg_duration_ms_by_type: HashMap<String, f64>,
    pub token_estimate_accuracy: f64,
    /// 1.0 to 10.0
    pub quality_rating: f64,
}

/// Result of executing a whole plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub plan_id: String,
    pub status: ExecutionStatus,
    pub task_results: HashMap<String, TaskResult>,
    /// Resolved dependency order; empty when resolution never happened
    #[serde(default)]
    pub execution_order: Vec<String>,
    pub total_tokens: u64,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub feedback: RefinementFeedback,
}

impl ExecutionResult {
    pub fn new(plan_id: impl Into<String>) -> Self {
        Self {
            plan_id: plan_id.into(),
            status: ExecutionStatus::Pending,
            task_results: HashMap::new(),
            execution_order: Vec::new(),
            total_tokens: 0,
            duration_ms: 0,
            started_at: Utc::now(),
            completed_at: None,
            successful_tasks: 0,
            failed_tasks: 0,
            error: None,
            feedback: RefinementFeedback::default(),
        }
    }

    pub fn transition(&mut self, to: ExecutionStatus) -> Result<(), TransitionError> {
        StateTransition::validate_plan(self.status, to)?;
        self.status = to;
        if StateTransition::is_terminal_plan(to) {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Record a finished task and update the running counters.
    pub fn record(&mut self, result: TaskResult) {
        match result.status {
            TaskStatus::Completed => self.successful_tasks += 1,
            TaskStatus::Failed => self.failed_tasks += 1,
            _ => {}
        }
        self.total_tokens += u64::from(result.tokens_used);
        self.task_results.insert(result.task_id.clone(), result);
    }

    pub fn quality_rating(&self) -> f64 {
        self.feedback.quality_rating
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_result_rejects_skipping_running() {
        let mut r = TaskResult::pending("a");
        assert!(r.transition(TaskStatus::Completed).is_err());
        assert!(r.transition(TaskStatus::Running).is_ok());
        assert!(r.transition(TaskStatus::Completed).is_ok());
        assert!(r.completed_at.is_some());
    }

    #[test]
    fn apply_output_clamps_confidence() {
        let mut r = TaskResult::pending("a");
        r.apply_output(TaskOutput {
            confidence: 1.7,
            tokens_used: 12,
            ..Default::default()
        });
        assert_eq!(r.confidence, 1.0);
        assert_eq!(r.tokens_used, 12);
    }

    #[test]
    fn record_updates_counters() {
        let mut result = ExecutionResult::new("plan");
        let mut ok = TaskResult::pending("a");
        ok.status = TaskStatus::Completed;
        ok.tokens_used = 40;
        let mut bad = TaskResult::pending("b");
        bad.status = TaskStatus::Failed;
        let mut blocked = TaskResult::pending("c");
        blocked.status = TaskStatus::Blocked;

        result.record(ok);
        result.record(bad);
        result.record(blocked);

        assert_eq!(result.successful_tasks, 1);
        assert_eq!(result.failed_tasks, 1);
        assert_eq!(result.total_tokens, 40);
        assert_eq!(result.task_results.len(), 3);
    }
}
