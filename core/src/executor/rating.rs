use std::collections::HashMap;

use crate::executor::types::{ExecutionPlan, ExecutionResult, RefinementFeedback};
use crate::state::TaskStatus;

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 10.0;

/// successful / (successful + failed); 0.0 when nothing was attempted
pub fn success_rate(result: &ExecutionResult) -> f64 {
    let attempted = result.successful_tasks + result.failed_tasks;
    if attempted == 0 {
        return 0.0;
    }
    result.successful_tasks as f64 / attempted as f64
}

/// Quality rating in `[1.0, 10.0]`.
///
/// Starts at 5.0, moves up to ±3 with the success rate and up to ±1 with the average
/// confidence of completed tasks that reported one.
pub fn quality_rating(result: &ExecutionResult) -> f64 {
    let mut rating = 5.0 + (success_rate(result) - 0.5) * 6.0;

    let confidences: Vec<f64> = result
        .task_results
        .values()
        .filter(|r| r.status == TaskStatus::Completed && r.confidence > 0.0)
        .map(|r| r.confidence)
        .collect();
    if !confidences.is_empty() {
        let avg = confidences.iter().sum::<f64>() / confidences.len() as f64;
        rating += (avg - 0.5) * 2.0;
    }

    rating.clamp(MIN_RATING, MAX_RATING)
}

/// How close the estimate was to actual usage, in `[0.0, 1.0]`.
pub fn token_estimate_accuracy(estimated: u64, actual: u64) -> f64 {
    match (estimated, actual) {
        (0, 0) => 1.0,
        (0, _) => 0.0,
        _ => {
            let diff = estimated.abs_diff(actual) as f64;
            (1.0 - diff / estimated as f64).max(0.0)
        }
    }
}

/// Aggregate per-type statistics over the tasks that actually ran.
pub fn build_feedback(plan: &ExecutionPlan, result: &ExecutionResult) -> RefinementFeedback {
    let mut failures_by_type: HashMap<String, usize> = HashMap::new();
    let mut durations: HashMap<String, (u64, usize)> = HashMap::new();
    let mut estimated = 0u64;
    let mut actual = 0u64;

    for task in &plan.tasks {
        let Some(task_result) = result.task_results.get(&task.id) else {
            continue;
        };
        match task_result.status {
            TaskStatus::Completed => {}
            TaskStatus::Failed => {
                *failures_by_type.entry(task.task_type.clone()).or_default() += 1;
            }
            _ => continue,
        }

        let entry = durations.entry(task.task_type.clone()).or_default();
        entry.0 += task_result.duration_ms;
        entry.1 += 1;
        estimated += u64::from(task.estimated_tokens);
        actual += u64::from(task_result.tokens_used);
    }

    let avg_duration_ms_by_type = durations
        .into_iter()
        .map(|(ty, (total, count))| (ty, total as f64 / count as f64))
        .collect();

    RefinementFeedback {
        success_rate: success_rate(result),
        failures_by_type,
        avg_duration_ms_by_type,
        token_estimate_accuracy: token_estimate_accuracy(estimated, actual),
        quality_rating: quality_rating(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::{ExecutionTask, TaskResult};

    fn finished(id: &str, status: TaskStatus, confidence: f64) -> TaskResult {
        let mut r = TaskResult::pending(id);
        r.status = status;
        r.confidence = confidence;
        r
    }

    #[test]
    fn perfect_run_rates_nine() {
        let mut result = ExecutionResult::new("p");
        result.record(finished("a", TaskStatus::Completed, 1.0));
        result.record(finished("b", TaskStatus::Completed, 1.0));
        // 5 + 3 + 1
        assert_eq!(quality_rating(&result), 9.0);
    }

    #[test]
    fn zero_confidence_is_ignored() {
        let mut result = ExecutionResult::new("p");
        result.record(finished("a", TaskStatus::Completed, 0.0));
        assert_eq!(quality_rating(&result), 8.0);
    }

    #[test]
    fn all_failed_clamps_to_floor() {
        let mut result = ExecutionResult::new("p");
        result.record(finished("a", TaskStatus::Failed, 0.0));
        assert_eq!(quality_rating(&result), 2.0);

        let empty = ExecutionResult::new("p");
        assert_eq!(success_rate(&empty), 0.0);
        assert_eq!(quality_rating(&empty), 2.0);
    }

    #[test]
    fn rating_stays_in_range() {
        for succ in 0..4 {
            for fail in 0..4 {
                for conf in [0.0, 0.01, 0.5, 1.0] {
                    let mut result = ExecutionResult::new("p");
                    for i in 0..succ {
                        result.record(finished(&format!("s{i}"), TaskStatus::Completed, conf));
                    }
                    for i in 0..fail {
                        result.record(finished(&format!("f{i}"), TaskStatus::Failed, conf));
                    }
                    let rating = quality_rating(&result);
                    assert!((MIN_RATING..=MAX_RATING).contains(&rating), "{rating}");
                }
            }
        }
    }

    #[test]
    fn token_accuracy_edges() {
        assert_eq!(token_estimate_accuracy(0, 0), 1.0);
        assert_eq!(token_estimate_accuracy(0, 10), 0.0);
        assert_eq!(token_estimate_accuracy(100, 100), 1.0);
        assert_eq!(token_estimate_accuracy(100, 150), 0.5);
        assert_eq!(token_estimate_accuracy(100, 400), 0.0);
    }

    #[test]
    fn feedback_groups_by_task_type() {
        let plan = ExecutionPlan::new(
            "obj",
            "m",
            vec![
                ExecutionTask::new("a", "fetch").with_estimated_tokens(100),
                ExecutionTask::new("b", "fetch").with_estimated_tokens(100),
                ExecutionTask::new("c", "parse").with_estimated_tokens(100),
                ExecutionTask::new("d", "parse"),
            ],
            vec![],
        );
        let mut result = ExecutionResult::new(&plan.id);
        let mut a = finished("a", TaskStatus::Completed, 0.9);
        a.duration_ms = 100;
        a.tokens_used = 120;
        let mut b = finished("b", TaskStatus::Failed, 0.0);
        b.duration_ms = 300;
        b.tokens_used = 80;
        let mut c = finished("c", TaskStatus::Failed, 0.0);
        c.duration_ms = 50;
        c.tokens_used = 100;
        result.record(a);
        result.record(b);
        result.record(c);
        result.record(finished("d", TaskStatus::Blocked, 0.0));

        let feedback = build_feedback(&plan, &result);
        assert_eq!(feedback.failures_by_type.get("fetch"), Some(&1));
        assert_eq!(feedback.failures_by_type.get("parse"), Some(&1));
        assert_eq!(feedback.avg_duration_ms_by_type.get("fetch"), Some(&200.0));
        assert_eq!(feedback.avg_duration_ms_by_type.get("parse"), Some(&50.0));
        assert_eq!(feedback.token_estimate_accuracy, 1.0);
        assert!((feedback.success_rate - 1.0 / 3.0).abs() < 1e-9);
    }
}
