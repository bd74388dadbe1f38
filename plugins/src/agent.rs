use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use cadence_core::api::{
    ExecutionAnalysis, ExecutionPlan, ExecutionResult, ExecutionStatus, LearningAgent,
    LearningOutcome, Method, MethodPatch, MethodRefinement, Recommendation,
    RefinementEvaluation, RefinementKind, TaskStatus,
};

/// Error fragments that point at the environment rather than the method
pub fn default_environment_markers() -> Vec<String> {
    [
        "timeout",
        "rate_limit",
        "temporary_unavailable",
        "network_error",
        "connection refused",
        "permission denied",
        "command not found",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Rule-based learning collaborator.
///
/// Analysis classifies an execution from its status and failure messages. Proposals
/// retire methods that never succeeded, or drop the steps whose task type failed in
/// the last analyzed execution. Evaluation applies a refinement when it makes the
/// method simpler or is expected to raise its success rate.
pub struct HeuristicLearningAgent {
    environment_markers: Vec<String>,
    retire_after_executions: u32,
    /// Failed task types from the last analysis, per method id
    failed_types: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl Default for HeuristicLearningAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicLearningAgent {
    pub fn new() -> Self {
        Self {
            environment_markers: default_environment_markers(),
            retire_after_executions: 5,
            failed_types: Mutex::new(HashMap::new()),
        }
    }

    /// Markers match case-insensitively.
    pub fn with_environment_markers(mut self, markers: Vec<String>) -> Self {
        self.environment_markers = markers
            .into_iter()
            .map(|marker| marker.to_ascii_lowercase())
            .collect();
        self
    }

    pub fn with_retire_after(mut self, executions: u32) -> Self {
        self.retire_after_executions = executions;
        self
    }

    fn is_environmental(&self, message: &str) -> bool {
        let message = message.to_ascii_lowercase();
        self.environment_markers
            .iter()
            .any(|marker| !marker.is_empty() && message.contains(marker.as_str()))
    }

    fn remember_failures(&self, method_id: &str, types: BTreeSet<String>) {
        let mut guard = self
            .failed_types
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(method_id.to_string(), types);
    }

    fn failures_of(&self, method_id: &str) -> BTreeSet<String> {
        self.failed_types
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(method_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// `method` with every step of a failed type removed, or `None` when nothing (or
/// everything) would be removed.
fn without_failed_steps(method: &Method, failed: &BTreeSet<String>) -> Option<MethodPatch> {
    let (dropped, mut kept): (Vec<_>, Vec<_>) = method
        .approach
        .iter()
        .cloned()
        .partition(|step| failed.contains(step.effective_task_type()));
    if dropped.is_empty() || kept.is_empty() {
        return None;
    }

    let dropped_names: BTreeSet<&str> = dropped.iter().map(|s| s.name.as_str()).collect();
    for step in &mut kept {
        step.depends_on.retain(|name| !dropped_names.contains(name.as_str()));
    }
    Some(MethodPatch {
        approach: Some(kept),
        ..Default::default()
    })
}

#[async_trait]
impl LearningAgent for HeuristicLearningAgent {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn analyze_outcome(
        &self,
        result: &ExecutionResult,
        plan: &ExecutionPlan,
        method: &Method,
    ) -> Result<ExecutionAnalysis> {
        let failures: Vec<(&str, &str)> = plan
            .tasks
            .iter()
            .filter_map(|task| {
                let task_result = result.task_results.get(&task.id)?;
                (task_result.status == TaskStatus::Failed).then(|| {
                    (
                        task.task_type.as_str(),
                        task_result.error.as_deref().unwrap_or_default(),
                    )
                })
            })
            .collect();
        let attempted = result.successful_tasks + result.failed_tasks;

        let assessment = if attempted == 0 {
            LearningOutcome::InsufficientData
        } else if result.status == ExecutionStatus::Completed {
            LearningOutcome::Success
        } else if !failures.is_empty()
            && failures.iter().all(|(_, message)| self.is_environmental(message))
        {
            LearningOutcome::EnvironmentFailure
        } else if result.status == ExecutionStatus::Partial {
            LearningOutcome::PartialSuccess
        } else {
            LearningOutcome::MethodFailure
        };

        let failed_types: BTreeSet<String> =
            failures.iter().map(|(ty, _)| ty.to_string()).collect();
        self.remember_failures(&method.id, failed_types.clone());

        let mut analysis = ExecutionAnalysis::new(assessment);
        analysis.insights.push(format!(
            "{} of {} attempted task(s) succeeded",
            result.successful_tasks, attempted
        ));
        for (ty, message) in &failures {
            analysis.insights.push(format!("{ty} failed: {message}"));
        }
        for ty in &failed_types {
            analysis
                .recommendations
                .push(format!("rework or drop steps of type '{ty}'"));
        }
        analysis.confidence = if plan.tasks.is_empty() {
            0.0
        } else {
            attempted as f64 / plan.tasks.len() as f64
        };

        tracing::debug!(plan_id = %plan.id, assessment = ?assessment, "outcome analyzed");
        Ok(analysis)
    }

    async fn propose_refinement(
        &self,
        analysis: &ExecutionAnalysis,
        method: &Method,
    ) -> Result<MethodRefinement> {
        if analysis.assessment.forbids_refinement() {
            return Ok(MethodRefinement::none("assessment does not call for a change"));
        }

        let metrics = &method.metrics;
        if metrics.success_count == 0 && metrics.execution_count >= self.retire_after_executions {
            return Ok(MethodRefinement {
                kind: RefinementKind::Retire,
                rationale: format!(
                    "no successful execution in {} attempts",
                    metrics.execution_count
                ),
                changes: MethodPatch::default(),
            });
        }

        let failed = self.failures_of(&method.id);
        match without_failed_steps(method, &failed) {
            Some(changes) => Ok(MethodRefinement {
                kind: RefinementKind::Modify,
                rationale: format!(
                    "drop failing step type(s): {}",
                    failed.into_iter().collect::<Vec<_>>().join(", ")
                ),
                changes,
            }),
            None => Ok(MethodRefinement::none("no step can be dropped")),
        }
    }

    async fn evaluate_refinement(
        &self,
        method: &Method,
        refinement: &MethodRefinement,
    ) -> Result<RefinementEvaluation> {
        let (complexity_reduction, expected_success_gain) = match refinement.kind {
            RefinementKind::None => (0.0, 0.0),
            RefinementKind::Retire => (1.0, 0.0),
            RefinementKind::Modify | RefinementKind::Replace => {
                let before = method.complexity() as f64;
                let refined = refinement.changes.apply(method);
                let after = refined.complexity() as f64;
                let reduction = if before > 0.0 {
                    (before - after) / before
                } else {
                    0.0
                };
                let failure_share = 1.0 - method.metrics.success_rate() / 100.0;
                let removed = method.approach.len().saturating_sub(refined.approach.len());
                let gain = if method.approach.is_empty() {
                    0.0
                } else {
                    failure_share * removed as f64 / method.approach.len() as f64
                };
                (reduction, gain)
            }
        };

        let recommendation = if refinement.kind != RefinementKind::None
            && (complexity_reduction > 0.0 || expected_success_gain > 0.0)
        {
            Recommendation::Apply
        } else {
            Recommendation::Reject
        };

        Ok(RefinementEvaluation {
            recommendation,
            expected_success_gain,
            complexity_reduction,
            reasoning: format!(
                "complexity reduction {complexity_reduction:.2}, expected gain {expected_success_gain:.2}"
            ),
        })
    }
}
