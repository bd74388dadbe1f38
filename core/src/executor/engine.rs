use std::sync::Arc;

use tokio::time::Instant;

use crate::error::{ExecutorError, PlanRunError, TaskRunError};
use crate::state::{ExecutionStatus, TaskStatus};

use super::cancel::CancelSignal;
use super::graph::TaskGraph;
use super::rating::build_feedback;
use super::retry::RetryingExecutor;
use super::traits::{
    ContextLoader, CriticalityPolicy, DefaultCriticality, ExecutionEvent, ExecutionObserver,
    ExecutionStore, TaskExecutor, TracingObserver,
};
use super::types::{ExecutionPlan, ExecutionResult, RetryConfig, TaskResult};

/// Plan execution controller.
///
/// Validates a plan, resolves its dependency order, runs the tasks strictly one after
/// another through a [`RetryingExecutor`], and rates the outcome.
pub struct PlanExecutor {
    executor: Arc<dyn TaskExecutor>,
    context_loader: Arc<dyn ContextLoader>,
    observer: Arc<dyn ExecutionObserver>,
    store: Option<Arc<dyn ExecutionStore>>,
    criticality: Arc<dyn CriticalityPolicy>,
    retry_config: RetryConfig,
}

pub struct PlanExecutorBuilder {
    executor: Arc<dyn TaskExecutor>,
    context_loader: Arc<dyn ContextLoader>,
    observer: Option<Arc<dyn ExecutionObserver>>,
    store: Option<Arc<dyn ExecutionStore>>,
    criticality: Option<Arc<dyn CriticalityPolicy>>,
    retry_config: RetryConfig,
}

impl PlanExecutor {
    pub fn builder(
        executor: Arc<dyn TaskExecutor>,
        context_loader: Arc<dyn ContextLoader>,
    ) -> PlanExecutorBuilder {
        PlanExecutorBuilder::new(executor, context_loader)
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    /// Replace the retry policy for subsequent runs; `None` leaves it unchanged.
    pub fn set_retry_config(&mut self, config: Option<RetryConfig>) {
        if let Some(config) = config {
            self.retry_config = config;
        }
    }

    pub fn observer(&self) -> &Arc<dyn ExecutionObserver> {
        &self.observer
    }

    /// Execute every task of `plan` in dependency order.
    ///
    /// `Ok` for `completed` and `partial` runs. A `failed` or `cancelled` run returns
    /// [`PlanRunError`], which still carries the populated result.
    #[tracing::instrument(name = "plan.execute", skip_all, fields(plan_id = %plan.id))]
    pub async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        cancel: &CancelSignal,
    ) -> Result<ExecutionResult, PlanRunError> {
        let started = Instant::now();
        let mut result = ExecutionResult::new(&plan.id);

        if let Err(err) = plan.validate() {
            return Err(self.reject(plan, result, started, err));
        }
        let graph = match TaskGraph::from_plan(plan) {
            Ok(graph) => graph,
            Err(err) => return Err(self.reject(plan, result, started, err)),
        };
        let order = match graph.resolve_order() {
            Ok(order) => order,
            Err(err) => return Err(self.reject(plan, result, started, err)),
        };
        result.execution_order = order.iter().map(|id| id.to_string()).collect();

        if let Err(err) = result.transition(ExecutionStatus::Running) {
            return Err(PlanRunError::new(result, err.into()));
        }

        tracing::info!(
            objective_id = %plan.objective_id,
            method_id = %plan.method_id,
            total_tasks = plan.tasks.len(),
            "executing plan"
        );
        self.observer.on_event(&ExecutionEvent::PlanStart {
            plan_id: plan.id.clone(),
            objective_id: plan.objective_id.clone(),
            total_tasks: plan.tasks.len(),
        });
        self.observer.on_event(&ExecutionEvent::PlanOrder {
            plan_id: plan.id.clone(),
            order: result.execution_order.clone(),
            stages: graph
                .stages()
                .unwrap_or_default()
                .into_iter()
                .map(|stage| stage.into_iter().map(str::to_string).collect())
                .collect(),
        });

        let retrying = RetryingExecutor::new(
            self.executor.as_ref(),
            self.context_loader.as_ref(),
            &self.retry_config,
            self.observer.as_ref(),
        );

        let mut abort: Option<ExecutorError> = None;

        for (idx, task_id) in order.iter().enumerate() {
            let Some(task) = graph.nodes.get(task_id).copied() else {
                continue;
            };

            match retrying.run(&plan.id, task, cancel).await {
                Ok(task_result) => {
                    self.observer.on_event(&ExecutionEvent::TaskComplete {
                        plan_id: plan.id.clone(),
                        result: task_result.clone(),
                    });
                    result.record(task_result);
                }
                Err(TaskRunError { error, .. }) if error.is_cancelled() => {
                    return Err(self.cancelled(result, started, error));
                }
                Err(TaskRunError {
                    result: task_result,
                    error,
                }) => {
                    self.observer.on_event(&ExecutionEvent::TaskComplete {
                        plan_id: plan.id.clone(),
                        result: (*task_result).clone(),
                    });
                    let message = task_result.error.clone().unwrap_or_else(|| error.to_string());
                    result.record(*task_result);

                    if self.criticality.is_critical(task, &graph) {
                        tracing::error!(task_id = %task.id, error = %message, "critical task failed, aborting plan");
                        abort = Some(ExecutorError::CriticalTaskFailed {
                            task_id: task.id.clone(),
                            message,
                        });
                        self.block_remaining(&mut result, &order[idx + 1..]);
                        break;
                    }

                    let warning = format!("task '{}' failed, continuing: {}", task.id, message);
                    tracing::warn!(task_id = %task.id, "{}", warning);
                    self.observer.on_event(&ExecutionEvent::warning(
                        Some(&plan.id),
                        Some(&task.id),
                        warning,
                    ));
                }
            }
        }

        let error = match abort {
            Some(err) => Some(err),
            None if result.failed_tasks > 0 && result.successful_tasks == 0 => {
                Some(ExecutorError::AllTasksFailed {
                    failed: result.failed_tasks,
                })
            }
            None => None,
        };
        let status = match (&error, result.failed_tasks) {
            (Some(_), _) => ExecutionStatus::Failed,
            (None, 0) => ExecutionStatus::Completed,
            (None, _) => ExecutionStatus::Partial,
        };

        if let Err(err) = result.transition(status) {
            return Err(PlanRunError::new(result, err.into()));
        }
        result.error = error.as_ref().map(ToString::to_string);
        result.duration_ms = started.elapsed().as_millis() as u64;
        result.feedback = build_feedback(plan, &result);

        self.persist(plan, &result).await;
        self.observer.on_event(&ExecutionEvent::PlanEnd {
            plan_id: plan.id.clone(),
            result: result.clone(),
        });

        match error {
            Some(err) => Err(PlanRunError::new(result, err)),
            None => Ok(result),
        }
    }

    /// Tasks that were never started because a critical task failed.
    fn block_remaining(&self, result: &mut ExecutionResult, remaining: &[&str]) {
        for task_id in remaining {
            let mut blocked = TaskResult::pending(*task_id);
            // pending -> blocked is always allowed
            if blocked.transition(TaskStatus::Blocked).is_ok() {
                result.record(blocked);
            }
        }
    }

    /// Validation or resolution failure: nothing ran, nothing is persisted.
    fn reject(
        &self,
        plan: &ExecutionPlan,
        mut result: ExecutionResult,
        started: Instant,
        error: ExecutorError,
    ) -> PlanRunError {
        tracing::error!(error = %error, "plan rejected");
        // pending -> failed is always allowed
        let _ = result.transition(ExecutionStatus::Failed);
        result.error = Some(error.to_string());
        result.duration_ms = started.elapsed().as_millis() as u64;
        result.feedback = build_feedback(plan, &result);
        self.observer.on_event(&ExecutionEvent::PlanEnd {
            plan_id: plan.id.clone(),
            result: result.clone(),
        });
        PlanRunError::new(result, error)
    }

    /// No rating, no feedback, no persistence after cancellation.
    fn cancelled(
        &self,
        mut result: ExecutionResult,
        started: Instant,
        error: ExecutorError,
    ) -> PlanRunError {
        tracing::warn!(error = %error, "plan cancelled");
        // running -> cancelled is always allowed
        let _ = result.transition(ExecutionStatus::Cancelled);
        result.error = Some(error.to_string());
        result.duration_ms = started.elapsed().as_millis() as u64;
        self.observer.on_event(&ExecutionEvent::PlanEnd {
            plan_id: result.plan_id.clone(),
            result: result.clone(),
        });
        PlanRunError::new(result, error)
    }

    async fn persist(&self, plan: &ExecutionPlan, result: &ExecutionResult) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.save_plan(plan).await {
            self.warn_store(&plan.id, format!("failed to persist plan: {err}"));
        }
        if let Err(err) = store.save_result(result).await {
            self.warn_store(&plan.id, format!("failed to persist execution result: {err}"));
        }
    }

    fn warn_store(&self, plan_id: &str, message: String) {
        tracing::warn!(%plan_id, "{}", message);
        self.observer
            .on_event(&ExecutionEvent::warning(Some(plan_id), None, message));
    }
}

impl PlanExecutorBuilder {
    pub fn new(executor: Arc<dyn TaskExecutor>, context_loader: Arc<dyn ContextLoader>) -> Self {
        Self {
            executor,
            context_loader,
            observer: None,
            store: None,
            criticality: None,
            retry_config: RetryConfig::default(),
        }
    }

    pub fn observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn store(mut self, store: Arc<dyn ExecutionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn criticality(mut self, policy: Arc<dyn CriticalityPolicy>) -> Self {
        self.criticality = Some(policy);
        self
    }

    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn build(self) -> PlanExecutor {
        PlanExecutor {
            executor: self.executor,
            context_loader: self.context_loader,
            observer: self.observer.unwrap_or_else(|| Arc::new(TracingObserver)),
            store: self.store,
            criticality: self
                .criticality
                .unwrap_or_else(|| Arc::new(DefaultCriticality::default())),
            retry_config: self.retry_config,
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::executor::traits::{EmptyContextLoader, ResolvedContext};
    use crate::executor::types::{ExecutionTask, TaskOutput};

    struct Echo;

    #[async_trait]
    impl TaskExecutor for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn execute(
            &self,
            task: &ExecutionTask,
            _context: &ResolvedContext,
        ) -> anyhow::Result<TaskOutput> {
            Ok(TaskOutput {
                output: serde_json::json!({ "task": task.id }),
                confidence: 0.9,
                ..Default::default()
            })
        }
    }

    fn executor() -> PlanExecutor {
        PlanExecutor::builder(Arc::new(Echo), Arc::new(EmptyContextLoader)).build()
    }

    #[test]
    fn set_retry_config_none_is_noop() {
        let mut exec = executor();
        let before = exec.retry_config().clone();
        exec.set_retry_config(None);
        assert_eq!(exec.retry_config(), &before);

        exec.set_retry_config(Some(RetryConfig {
            max_retries: 7,
            ..Default::default()
        }));
        assert_eq!(exec.retry_config().max_retries, 7);
    }

    #[tokio::test]
    async fn executes_in_dependency_order() {
        let plan = ExecutionPlan::new(
            "obj",
            "m",
            vec![ExecutionTask::new("b", "x"), ExecutionTask::new("a", "x")],
            vec![crate::executor::types::TaskDependency::new("b", "a")],
        );
        let result = executor()
            .execute_plan(&plan, &CancelSignal::new())
            .await
            .unwrap();
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.execution_order, vec!["a", "b"]);
        assert_eq!(result.successful_tasks, 2);
        assert!(result.completed_at.is_some());
    }

    #[tokio::test]
    async fn invalid_plan_fails_without_running() {
        let plan = ExecutionPlan::new("obj", "m", vec![], vec![]);
        let err = executor()
            .execute_plan(&plan, &CancelSignal::new())
            .await
            .unwrap_err();
        assert!(err.error.is_validation());
        assert_eq!(err.result.status, ExecutionStatus::Failed);
        assert!(err.result.task_results.is_empty());
    }
}
