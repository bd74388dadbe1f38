use std::sync::Mutex;

use cadence_core::api::{ExecutionEvent, ExecutionObserver, ExecutionStatus, ProgressMonitor};

/// Human-readable observer.
///
/// With progress bars enabled, task activity is drawn as `indicatif` bars and only the
/// plan summary and warnings are printed; otherwise every event becomes one line on
/// stderr.
pub struct TextObserver {
    progress: bool,
    ascii_only: bool,
    monitor: Mutex<Option<ProgressMonitor>>,
}

impl TextObserver {
    pub fn new(progress: bool) -> Self {
        Self {
            progress,
            ascii_only: false,
            monitor: Mutex::new(None),
        }
    }

    pub fn ascii_only(mut self, ascii_only: bool) -> Self {
        self.ascii_only = ascii_only;
        self
    }

    fn format_event(&self, event: &ExecutionEvent) -> String {
        match event {
            ExecutionEvent::PlanStart {
                plan_id,
                objective_id,
                total_tasks,
            } => format!(
                "PLAN START {} (objective {}, tasks: {})",
                plan_id, objective_id, total_tasks
            ),
            ExecutionEvent::PlanOrder { plan_id, stages, .. } => {
                let mut out = format!("PLAN ORDER {}:", plan_id);
                for (idx, stage) in stages.iter().enumerate() {
                    out.push_str(&format!("\n  stage {}: {}", idx, stage.join(", ")));
                }
                out
            }
            ExecutionEvent::TaskStart {
                task_id, attempt, ..
            } => format!("TASK START {} (attempt {})", task_id, attempt),
            ExecutionEvent::TaskRetry {
                task_id,
                attempt,
                delay_ms,
                error,
                ..
            } => format!(
                "TASK RETRY {} (attempt {} failed, next in {}ms): {}",
                task_id, attempt, delay_ms, error
            ),
            ExecutionEvent::TaskComplete { result, .. } => {
                let status = match (result.is_success(), self.ascii_only) {
                    (true, true) => "OK",
                    (true, false) => "SUCCESS",
                    (false, true) => "FAIL",
                    (false, false) => "FAILED",
                };
                let mut line = format!(
                    "TASK END {} (status {}, attempts {}, duration {}ms)",
                    result.task_id, status, result.attempts, result.duration_ms
                );
                if let Some(err) = &result.error {
                    line.push_str(&format!(": {}", err));
                }
                line
            }
            ExecutionEvent::PlanEnd { plan_id, result } => format!(
                "PLAN END {} (status {}, succeeded {}, failed {}, rating {:.1}, duration {}ms)",
                plan_id,
                result.status,
                result.successful_tasks,
                result.failed_tasks,
                result.feedback.quality_rating,
                result.duration_ms
            ),
            ExecutionEvent::Warning {
                task_id, message, ..
            } => match task_id {
                Some(task_id) => format!("WARN {}: {}", task_id, message),
                None => format!("WARN {}", message),
            },
        }
    }

    /// Drive the progress bars; `true` when the event was fully rendered by them.
    fn update_progress(&self, event: &ExecutionEvent) -> bool {
        let mut guard = self
            .monitor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match event {
            ExecutionEvent::PlanStart { total_tasks, .. } => {
                *guard = Some(ProgressMonitor::new(*total_tasks, true));
                true
            }
            ExecutionEvent::PlanOrder { order, .. } => {
                if let Some(monitor) = guard.as_ref() {
                    monitor.set_message(&format!("{} task(s) ordered", order.len()));
                }
                true
            }
            ExecutionEvent::TaskStart {
                task_id, attempt, ..
            } => {
                if let Some(monitor) = guard.as_mut() {
                    monitor.start_task(task_id, *attempt);
                }
                true
            }
            ExecutionEvent::TaskRetry {
                task_id, delay_ms, ..
            } => {
                if let Some(monitor) = guard.as_mut() {
                    monitor.retry_task(task_id, *delay_ms);
                }
                true
            }
            ExecutionEvent::TaskComplete { result, .. } => {
                if let Some(monitor) = guard.as_mut() {
                    monitor.complete_task(&result.task_id, result.is_success(), result.duration_ms);
                }
                true
            }
            ExecutionEvent::PlanEnd { result, .. } => {
                if let Some(monitor) = guard.take() {
                    monitor.finish(result.status == ExecutionStatus::Completed);
                }
                false
            }
            ExecutionEvent::Warning { .. } => false,
        }
    }
}

impl ExecutionObserver for TextObserver {
    fn name(&self) -> &str {
        "text"
    }

    fn on_event(&self, event: &ExecutionEvent) {
        if self.progress && self.update_progress(event) {
            return;
        }
        eprintln!("{}", self.format_event(event));
    }
}

#[cfg(test)]
mod tests {
    use cadence_core::api::{ExecutionResult, TaskResult, TaskStatus};

    use super::*;

    #[test]
    fn task_end_line() {
        let observer = TextObserver::new(false).ascii_only(true);
        let mut result = TaskResult::pending("fetch");
        result.status = TaskStatus::Failed;
        result.attempts = 4;
        result.error = Some("timeout".into());

        let line = observer.format_event(&ExecutionEvent::TaskComplete {
            plan_id: "p".into(),
            result,
        });
        assert!(line.contains("TASK END fetch"));
        assert!(line.contains("status FAIL"));
        assert!(line.contains("attempts 4"));
        assert!(line.ends_with(": timeout"));
    }

    #[test]
    fn plan_order_lists_stages() {
        let observer = TextObserver::new(false);
        let line = observer.format_event(&ExecutionEvent::PlanOrder {
            plan_id: "p".into(),
            order: vec!["a".into(), "b".into(), "c".into()],
            stages: vec![vec!["a".into()], vec!["b".into(), "c".into()]],
        });
        assert!(line.contains("stage 0: a"));
        assert!(line.contains("stage 1: b, c"));
    }

    #[test]
    fn progress_mode_renders_plan_end_as_text() {
        let observer = TextObserver::new(true);
        assert!(observer.update_progress(&ExecutionEvent::PlanStart {
            plan_id: "p".into(),
            objective_id: "o".into(),
            total_tasks: 1,
        }));
        let mut result = ExecutionResult::new("p");
        result.status = ExecutionStatus::Completed;
        assert!(!observer.update_progress(&ExecutionEvent::PlanEnd {
            plan_id: "p".into(),
            result,
        }));
        assert!(observer.monitor.lock().unwrap().is_none());
    }
}
