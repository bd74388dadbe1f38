use tokio::time::Instant;

use crate::error::{ExecutorError, TaskRunError};
use crate::executor::cancel::CancelSignal;
use crate::executor::traits::{
    ContextLoader, ExecutionEvent, ExecutionObserver, ResolvedContext, TaskExecutor,
};
use crate::executor::types::{ExecutionTask, RetryConfig, TaskOutput, TaskResult};
use crate::state::TaskStatus;

/// Outcome of one attempt that was not cancelled
type AttemptOutcome = anyhow::Result<TaskOutput>;

/// Drives one task through `pending -> running -> {completed | retrying -> running ... | failed}`.
///
/// Borrowed for the length of a plan run so the retry policy cannot change mid-run.
pub struct RetryingExecutor<'a> {
    executor: &'a dyn TaskExecutor,
    context_loader: &'a dyn ContextLoader,
    config: &'a RetryConfig,
    observer: &'a dyn ExecutionObserver,
}

impl<'a> RetryingExecutor<'a> {
    pub fn new(
        executor: &'a dyn TaskExecutor,
        context_loader: &'a dyn ContextLoader,
        config: &'a RetryConfig,
        observer: &'a dyn ExecutionObserver,
    ) -> Self {
        Self {
            executor,
            context_loader,
            config,
            observer,
        }
    }

    /// Run `task` until it completes, exhausts its attempts, or `cancel` fires.
    ///
    /// On failure the error carries the populated result. A cancelled run is
    /// reported as [`ExecutorError::Cancelled`] and never as a task failure.
    pub async fn run(
        &self,
        plan_id: &str,
        task: &ExecutionTask,
        cancel: &CancelSignal,
    ) -> Result<TaskResult, TaskRunError> {
        let started = Instant::now();
        let max_attempts = self.config.max_attempts();
        let mut result = TaskResult::pending(&task.id);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            if let Err(err) = cancel.check() {
                return Err(finish_err(result, started, err));
            }
            if let Err(err) = result.transition(TaskStatus::Running) {
                return Err(finish_err(result, started, err.into()));
            }
            result.attempts = attempt;
            self.observer.on_event(&ExecutionEvent::TaskStart {
                plan_id: plan_id.to_string(),
                task_id: task.id.clone(),
                attempt,
            });

            let outcome = match self.attempt(task, cancel).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::info!(%plan_id, task_id = %task.id, attempt, "task cancelled");
                    result.error = Some(err.to_string());
                    return Err(finish_err(result, started, err));
                }
            };

            let err = match outcome {
                Ok(output) => {
                    result.apply_output(output);
                    result.error = None;
                    if let Err(err) = result.transition(TaskStatus::Completed) {
                        return Err(finish_err(result, started, err.into()));
                    }
                    result.duration_ms = elapsed_ms(started);
                    return Ok(result);
                }
                Err(err) => err,
            };

            let message = format!("{err:#}");
            result.error = Some(message.clone());

            if self.config.is_retriable(&message) && attempt < max_attempts {
                let delay = self.config.delay_for_attempt(attempt);
                tracing::warn!(
                    %plan_id,
                    task_id = %task.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "task attempt failed, retrying"
                );
                if let Err(err) = result.transition(TaskStatus::Retrying) {
                    return Err(finish_err(result, started, err.into()));
                }
                self.observer.on_event(&ExecutionEvent::TaskRetry {
                    plan_id: plan_id.to_string(),
                    task_id: task.id.clone(),
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                    error: message,
                });
                if let Err(err) = cancel.sleep(delay).await {
                    return Err(finish_err(result, started, err));
                }
                continue;
            }

            tracing::warn!(
                %plan_id,
                task_id = %task.id,
                attempts = attempt,
                error = %message,
                "task failed"
            );
            if let Err(err) = result.transition(TaskStatus::Failed) {
                return Err(finish_err(result, started, err.into()));
            }
            let error = ExecutorError::TaskFailed {
                task_id: task.id.clone(),
                attempts: attempt,
                message,
            };
            return Err(finish_err(result, started, error));
        }
    }

    /// One attempt: load context, then execute. Both steps race the cancel signal.
    async fn attempt(
        &self,
        task: &ExecutionTask,
        cancel: &CancelSignal,
    ) -> Result<AttemptOutcome, ExecutorError> {
        let context: ResolvedContext =
            match cancel.run(self.context_loader.load_task_context(task)).await? {
                Ok(context) => context,
                Err(err) => {
                    return Ok(Err(
                        err.context(format!("failed to load context for task '{}'", task.id))
                    ))
                }
            };

        cancel.run(self.executor.execute(task, &context)).await
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn finish_err(mut result: TaskResult, started: Instant, error: ExecutorError) -> TaskRunError {
    result.duration_ms = elapsed_ms(started);
    TaskRunError {
        result: Box::new(result),
        error,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::executor::cancel::CancelReason;
    use crate::executor::traits::EmptyContextLoader;

    /// Replays scripted outcomes; repeats the last one when the script runs out.
    struct Scripted {
        calls: AtomicU32,
        script: Mutex<VecDeque<Result<f64, &'static str>>>,
    }

    impl Scripted {
        fn new(script: Vec<Result<f64, &'static str>>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                script: Mutex::new(script.into()),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskExecutor for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn execute(
            &self,
            _task: &ExecutionTask,
            _context: &ResolvedContext,
        ) -> anyhow::Result<TaskOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.pop_front().unwrap()
                } else {
                    *script.front().unwrap()
                }
            };
            match step {
                Ok(confidence) => Ok(TaskOutput {
                    tokens_used: 10,
                    confidence,
                    ..Default::default()
                }),
                Err(msg) => Err(anyhow::anyhow!(msg)),
            }
        }
    }

    #[derive(Default)]
    struct Delays(Mutex<Vec<u64>>);

    impl ExecutionObserver for Delays {
        fn name(&self) -> &str {
            "delays"
        }
        fn on_event(&self, event: &ExecutionEvent) {
            if let ExecutionEvent::TaskRetry { delay_ms, .. } = event {
                self.0.lock().unwrap().push(*delay_ms);
            }
        }
    }

    struct FailingLoader;

    #[async_trait]
    impl ContextLoader for FailingLoader {
        async fn load_task_context(&self, _task: &ExecutionTask) -> anyhow::Result<ResolvedContext> {
            anyhow::bail!("network_error: context backend unreachable")
        }
    }

    fn config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_retriable_failure_uses_every_attempt() {
        let exec = Scripted::new(vec![Err("timeout contacting model")]);
        let cfg = config(3);
        let delays = Delays::default();
        let runner = RetryingExecutor::new(&exec, &EmptyContextLoader, &cfg, &delays);
        let task = ExecutionTask::new("t1", "fetch");

        let err = runner
            .run("plan", &task, &CancelSignal::new())
            .await
            .unwrap_err();

        assert_eq!(exec.calls(), 4);
        assert_eq!(err.result.attempts, 4);
        assert_eq!(err.result.status, TaskStatus::Failed);
        assert!(matches!(err.error, ExecutorError::TaskFailed { attempts: 4, .. }));
        assert_eq!(*delays.0.lock().unwrap(), vec![100, 200, 400]);
        assert!(err.result.duration_ms >= 700);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retriable_failure_stops_immediately() {
        let exec = Scripted::new(vec![Err("permission denied")]);
        let cfg = config(3);
        let delays = Delays::default();
        let runner = RetryingExecutor::new(&exec, &EmptyContextLoader, &cfg, &delays);

        let err = runner
            .run("plan", &ExecutionTask::new("t1", "x"), &CancelSignal::new())
            .await
            .unwrap_err();

        assert_eq!(exec.calls(), 1);
        assert_eq!(err.result.error.as_deref(), Some("permission denied"));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failure() {
        let exec = Scripted::new(vec![Err("rate_limit hit"), Ok(0.8)]);
        let cfg = config(3);
        let delays = Delays::default();
        let runner = RetryingExecutor::new(&exec, &EmptyContextLoader, &cfg, &delays);

        let result = runner
            .run("plan", &ExecutionTask::new("t1", "x"), &CancelSignal::new())
            .await
            .unwrap();

        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.tokens_used, 10);
        assert_eq!(result.confidence, 0.8);
        assert!(result.error.is_none());
        assert!(result.completed_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt() {
        let exec = Scripted::new(vec![Err("timeout")]);
        let cfg = config(0);
        let delays = Delays::default();
        let runner = RetryingExecutor::new(&exec, &EmptyContextLoader, &cfg, &delays);

        let err = runner
            .run("plan", &ExecutionTask::new("t1", "x"), &CancelSignal::new())
            .await
            .unwrap_err();
        assert_eq!(exec.calls(), 1);
        assert_eq!(err.result.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn context_failure_is_retried_like_executor_failure() {
        let exec = Scripted::new(vec![Ok(1.0)]);
        let cfg = config(2);
        let delays = Delays::default();
        let runner = RetryingExecutor::new(&exec, &FailingLoader, &cfg, &delays);

        let err = runner
            .run("plan", &ExecutionTask::new("t1", "x"), &CancelSignal::new())
            .await
            .unwrap_err();

        assert_eq!(exec.calls(), 0);
        assert_eq!(err.result.attempts, 3);
        let message = err.result.error.unwrap();
        assert!(message.contains("failed to load context"));
        assert!(message.contains("network_error"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_is_not_a_failure() {
        let exec = Scripted::new(vec![Err("timeout")]);
        let cfg = RetryConfig {
            base_delay_ms: 10_000,
            max_delay_ms: 10_000,
            ..config(5)
        };
        let delays = Delays::default();
        let runner = RetryingExecutor::new(&exec, &EmptyContextLoader, &cfg, &delays);
        let cancel = CancelSignal::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = runner
            .run("plan", &ExecutionTask::new("t1", "x"), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.error, ExecutorError::Cancelled(CancelReason::Cancelled));
        assert_eq!(exec.calls(), 1);
        assert_ne!(err.result.status, TaskStatus::Failed);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn already_cancelled_signal_skips_execution() {
        let exec = Scripted::new(vec![Ok(1.0)]);
        let cfg = config(3);
        let delays = Delays::default();
        let runner = RetryingExecutor::new(&exec, &EmptyContextLoader, &cfg, &delays);
        let cancel = CancelSignal::new();
        cancel.cancel();

        let err = runner
            .run("plan", &ExecutionTask::new("t1", "x"), &cancel)
            .await
            .unwrap_err();
        assert!(err.error.is_cancelled());
        assert_eq!(exec.calls(), 0);
        assert_eq!(err.result.attempts, 0);
    }
}
