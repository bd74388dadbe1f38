use std::sync::Arc;

use crate::executor::types::{ExecutionResult, TaskResult};

/// Receives structured events from plan execution and the learning loop
pub trait ExecutionObserver: Send + Sync {
    fn name(&self) -> &str;
    fn on_event(&self, event: &ExecutionEvent);
}

/// Unified event type
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PlanStart {
        plan_id: String,
        objective_id: String,
        total_tasks: usize,
    },
    PlanOrder {
        plan_id: String,
        order: Vec<String>,
        stages: Vec<Vec<String>>,
    },
    TaskStart {
        plan_id: String,
        task_id: String,
        attempt: u32,
    },
    TaskRetry {
        plan_id: String,
        task_id: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    TaskComplete {
        plan_id: String,
        result: TaskResult,
    },
    PlanEnd {
        plan_id: String,
        result: ExecutionResult,
    },
    /// Non-fatal problem: tolerated task failure, store failure, collaborator failure
    Warning {
        plan_id: Option<String>,
        task_id: Option<String>,
        message: String,
    },
}

impl ExecutionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PlanStart { .. } => "plan.start",
            Self::PlanOrder { .. } => "plan.order",
            Self::TaskStart { .. } => "task.start",
            Self::TaskRetry { .. } => "task.retry",
            Self::TaskComplete { .. } => "task.end",
            Self::PlanEnd { .. } => "plan.end",
            Self::Warning { .. } => "warning",
        }
    }

    pub fn plan_id(&self) -> Option<&str> {
        match self {
            Self::PlanStart { plan_id, .. }
            | Self::PlanOrder { plan_id, .. }
            | Self::TaskStart { plan_id, .. }
            | Self::TaskRetry { plan_id, .. }
            | Self::TaskComplete { plan_id, .. }
            | Self::PlanEnd { plan_id, .. } => Some(plan_id),
            Self::Warning { plan_id, .. } => plan_id.as_deref(),
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::TaskStart { task_id, .. } | Self::TaskRetry { task_id, .. } => Some(task_id),
            Self::TaskComplete { result, .. } => Some(&result.task_id),
            Self::Warning { task_id, .. } => task_id.as_deref(),
            _ => None,
        }
    }

    pub fn warning(
        plan_id: Option<&str>,
        task_id: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self::Warning {
            plan_id: plan_id.map(str::to_string),
            task_id: task_id.map(str::to_string),
            message: message.into(),
        }
    }
}

/// Default observer: forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ExecutionObserver for TracingObserver {
    fn name(&self) -> &str {
        "tracing"
    }

    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::PlanStart {
                plan_id,
                objective_id,
                total_tasks,
            } => tracing::info!(%plan_id, %objective_id, total_tasks, "plan started"),
            ExecutionEvent::PlanOrder { plan_id, order, .. } => {
                tracing::debug!(%plan_id, order = ?order, "execution order resolved")
            }
            ExecutionEvent::TaskStart {
                plan_id,
                task_id,
                attempt,
            } => tracing::debug!(%plan_id, %task_id, attempt, "task attempt started"),
            ExecutionEvent::TaskRetry {
                plan_id,
                task_id,
                attempt,
                delay_ms,
                error,
            } => tracing::debug!(%plan_id, %task_id, attempt, delay_ms, %error, "task retry scheduled"),
            ExecutionEvent::TaskComplete { plan_id, result } => tracing::info!(
                %plan_id,
                task_id = %result.task_id,
                status = %result.status,
                attempts = result.attempts,
                duration_ms = result.duration_ms,
                "task finished"
            ),
            ExecutionEvent::PlanEnd { plan_id, result } => tracing::info!(
                %plan_id,
                status = %result.status,
                successful = result.successful_tasks,
                failed = result.failed_tasks,
                quality = result.feedback.quality_rating,
                "plan finished"
            ),
            ExecutionEvent::Warning {
                plan_id,
                task_id,
                message,
            } => tracing::warn!(plan_id = ?plan_id, task_id = ?task_id, "{}", message),
        }
    }
}

/// Broadcasts each event to every registered observer, in registration order.
#[derive(Clone, Default)]
pub struct FanoutObserver {
    observers: Vec<Arc<dyn ExecutionObserver>>,
}

impl FanoutObserver {
    pub fn new(observers: Vec<Arc<dyn ExecutionObserver>>) -> Self {
        Self { observers }
    }

    pub fn push(&mut self, observer: Arc<dyn ExecutionObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl ExecutionObserver for FanoutObserver {
    fn name(&self) -> &str {
        "fanout"
    }

    fn on_event(&self, event: &ExecutionEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}
