use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{ExecutorError, LearningError, LearningRunError};
use crate::executor::cancel::{CancelReason, CancelSignal};
use crate::executor::traits::{ExecutionEvent, ExecutionObserver};
use crate::executor::types::{ExecutionResult, RetryConfig};
use crate::executor::PlanExecutor;
use crate::ledger::{bump_version, MethodLedger, MethodStore, VersionBump};
use crate::state::ExecutionStatus;

use super::config::LearningLoopConfig;
use super::traits::{LearningAgent, Planner};
use super::types::{
    AttemptResult, ExecutionAnalysis, LearningOutcome, LearningResult, Method, MethodPatch,
    MethodRefinement, MethodStatus, Recommendation, RefinementKind, SuccessMetrics,
};

/// What to do after an attempt has been analyzed
enum Step {
    /// Stop with this outcome
    Finish(LearningOutcome),
    /// Run another attempt with the refined method
    Continue,
}

/// Refinement controller: plan, execute, analyze, and evolve a method across a
/// bounded number of attempts.
pub struct LearningLoop {
    planner: Arc<dyn Planner>,
    executor: PlanExecutor,
    agent: Arc<dyn LearningAgent>,
    store: Arc<dyn MethodStore>,
    ledger: MethodLedger,
    observer: Arc<dyn ExecutionObserver>,
    config: LearningLoopConfig,
}

impl LearningLoop {
    pub fn new(
        planner: Arc<dyn Planner>,
        executor: PlanExecutor,
        agent: Arc<dyn LearningAgent>,
        store: Arc<dyn MethodStore>,
    ) -> Self {
        let observer = executor.observer().clone();
        Self {
            planner,
            executor,
            agent,
            ledger: MethodLedger::new(store.clone()),
            store,
            observer,
            config: LearningLoopConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LearningLoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &LearningLoopConfig {
        &self.config
    }

    /// `None` leaves the configuration unchanged.
    pub fn set_config(&mut self, config: Option<LearningLoopConfig>) {
        if let Some(config) = config {
            self.config = config;
        }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        self.executor.retry_config()
    }

    /// `None` leaves the retry policy unchanged.
    pub fn set_retry_config(&mut self, config: Option<RetryConfig>) {
        self.executor.set_retry_config(config);
    }

    pub fn executor(&self) -> &PlanExecutor {
        &self.executor
    }

    pub fn ledger(&self) -> &MethodLedger {
        &self.ledger
    }

    /// Run the learning loop for one objective.
    ///
    /// Performs at most `max_refinement_attempts` plan executions and stops the first
    /// time an attempt needs no refinement.
    #[tracing::instrument(name = "learning.execute_objective", skip(self, cancel))]
    pub async fn execute_objective(
        &self,
        objective_id: &str,
        cancel: &CancelSignal,
    ) -> Result<LearningResult, LearningRunError> {
        let mut result = LearningResult::new(objective_id);

        let objective = match self.store.get_objective(objective_id).await {
            Ok(objective) => objective,
            Err(err) if err.is_not_found() => {
                return Err(fatal(result, LearningError::ObjectiveNotFound(objective_id.into())))
            }
            Err(err) => return Err(fatal(result, err.into())),
        };
        let mut method = match self.store.get_method(&objective.method_id).await {
            Ok(method) => method,
            Err(err) if err.is_not_found() => {
                return Err(fatal(result, LearningError::MethodNotFound(objective.method_id)))
            }
            Err(err) => return Err(fatal(result, err.into())),
        };
        result.final_method_id = method.id.clone();

        let max_attempts = self.config.max_refinement_attempts;
        for attempt in 1..=max_attempts {
            tracing::info!(attempt, max_attempts, method_id = %method.id, "learning attempt");

            if let Some(reason) = cancel.reason() {
                return Err(cancelled(result, reason));
            }

            let plan = match cancel.run(self.planner.create_plan(&objective, &method)).await {
                Ok(Ok(plan)) => plan,
                Ok(Err(err)) => {
                    tracing::error!(error = %format!("{err:#}"), "planner failed");
                    result.finish(LearningOutcome::EnvironmentFailure);
                    let error = LearningError::Planner {
                        objective_id: objective.id.clone(),
                        message: format!("{err:#}"),
                    };
                    return Err(LearningRunError::new(result, error));
                }
                Err(err) => return Err(cancelled(result, cancel_reason(&err))),
            };

            let execution = match self.executor.execute_plan(&plan, cancel).await {
                Ok(execution) => execution,
                Err(err) if err.error.is_cancelled() => {
                    let reason = cancel_reason(&err.error);
                    result.attempts.push(AttemptResult {
                        attempt,
                        plan_id: plan.id.clone(),
                        method_id: method.id.clone(),
                        execution: *err.result,
                        analysis: None,
                        refinement_applied: false,
                        refinement_kind: None,
                    });
                    return Err(cancelled(result, reason));
                }
                // A failed plan is still evidence about the method.
                Err(err) => *err.result,
            };

            let analysis = match self.agent.analyze_outcome(&execution, &plan, &method).await {
                Ok(analysis) => Some(analysis),
                Err(err) => {
                    self.warn(Some(&plan.id), format!("outcome analysis failed: {err:#}"));
                    None
                }
            };

            method = self.record_metrics(method, &execution).await;

            let mut attempt_result = AttemptResult {
                attempt,
                plan_id: plan.id.clone(),
                method_id: method.id.clone(),
                execution,
                analysis: analysis.clone(),
                refinement_applied: false,
                refinement_kind: None,
            };

            let step = match analysis {
                None => Step::Finish(outcome_from_status(attempt_result.execution.status)),
                Some(analysis) => match self
                    .refine(&analysis, &mut method, &mut attempt_result)
                    .await
                {
                    Ok(step) => step,
                    Err(err) => {
                        result.attempts.push(attempt_result);
                        result.final_method_id = method.id.clone();
                        result.finish(LearningOutcome::MethodFailure);
                        return Err(LearningRunError::new(result, err));
                    }
                },
            };

            result.attempts.push(attempt_result);
            result.final_method_id = method.id.clone();

            match step {
                Step::Finish(outcome) => {
                    tracing::info!(outcome = ?outcome, attempts = attempt, "learning finished");
                    result.finish(outcome);
                    return Ok(result);
                }
                Step::Continue => {}
            }
        }

        // Every attempt ended with a refinement: the method still was not good enough.
        let outcome = if result.attempts.is_empty() {
            LearningOutcome::InsufficientData
        } else {
            LearningOutcome::MethodFailure
        };
        tracing::info!(outcome = ?outcome, "learning attempts exhausted");
        result.finish(outcome);
        Ok(result)
    }

    /// Fold one execution into the method's metrics. Store failures are tolerated: the
    /// updated metrics are kept locally for the rest of the call.
    async fn record_metrics(&self, method: Method, execution: &ExecutionResult) -> Method {
        let metrics: SuccessMetrics = method.metrics.recorded(
            execution.status == ExecutionStatus::Completed,
            execution.quality_rating(),
            Utc::now(),
        );
        let patch = MethodPatch::metrics(metrics);
        match self.store.update_method(&method.id, &patch).await {
            Ok(updated) => updated,
            Err(err) => {
                self.warn(None, format!("failed to update metrics of method '{}': {err}", method.id));
                patch.apply(&method)
            }
        }
    }

    fn refinement_warranted(&self, analysis: &ExecutionAnalysis, method: &Method) -> bool {
        if analysis.assessment.forbids_refinement() {
            return false;
        }
        method.metrics.execution_count >= self.config.min_executions_before_refinement
            && method.metrics.success_rate() < self.config.success_rate_threshold_for_refinement
    }

    /// Decide on and apply a refinement for the analyzed attempt.
    async fn refine(
        &self,
        analysis: &ExecutionAnalysis,
        method: &mut Method,
        attempt: &mut AttemptResult,
    ) -> Result<Step, LearningError> {
        if !self.refinement_warranted(analysis, method) {
            return Ok(Step::Finish(analysis.assessment));
        }

        tracing::info!(
            method_id = %method.id,
            success_rate = method.metrics.success_rate(),
            executions = method.metrics.execution_count,
            "refinement warranted"
        );

        if !self.config.enable_method_evolution {
            tracing::info!("method evolution disabled");
            return Ok(Step::Finish(LearningOutcome::MethodFailure));
        }

        let refinement = match self.agent.propose_refinement(analysis, method).await {
            Ok(refinement) => refinement,
            Err(err) => {
                self.warn(None, format!("refinement proposal failed: {err:#}"));
                return Ok(Step::Finish(LearningOutcome::MethodFailure));
            }
        };
        attempt.refinement_kind = Some(refinement.kind);
        if refinement.kind == RefinementKind::None {
            return Ok(Step::Finish(LearningOutcome::MethodFailure));
        }

        let evaluation = match self.agent.evaluate_refinement(method, &refinement).await {
            Ok(evaluation) => evaluation,
            Err(err) => {
                self.warn(None, format!("refinement evaluation failed: {err:#}"));
                return Ok(Step::Finish(LearningOutcome::MethodFailure));
            }
        };
        if evaluation.recommendation != Recommendation::Apply {
            tracing::info!(recommendation = ?evaluation.recommendation, reasoning = %evaluation.reasoning, "refinement not applied");
            return Ok(Step::Finish(LearningOutcome::MethodFailure));
        }
        if self.config.prefers_simpler_methods() && evaluation.complexity_reduction <= 0.0 {
            tracing::info!(
                complexity_reduction = evaluation.complexity_reduction,
                "refinement rejected, does not simplify the method"
            );
            return Ok(Step::Finish(LearningOutcome::MethodFailure));
        }

        match refinement.kind {
            RefinementKind::Retire => {
                *method = self.ledger.retire(&method.id, &refinement.rationale).await?;
                attempt.refinement_applied = true;
                Ok(Step::Finish(LearningOutcome::MethodFailure))
            }
            RefinementKind::Modify | RefinementKind::Replace => {
                let next = derive_method(method, &refinement)?;
                *method = self
                    .ledger
                    .evolve(&method.id, next, &refinement.rationale)
                    .await?;
                attempt.refinement_applied = true;
                Ok(Step::Continue)
            }
            RefinementKind::None => Ok(Step::Finish(LearningOutcome::MethodFailure)),
        }
    }

    fn warn(&self, plan_id: Option<&str>, message: String) {
        tracing::warn!(plan_id = ?plan_id, "{}", message);
        self.observer
            .on_event(&ExecutionEvent::warning(plan_id, None, message));
    }
}

/// Copy-on-write successor of `method` with fresh metrics and a bumped version.
fn derive_method(method: &Method, refinement: &MethodRefinement) -> Result<Method, LearningError> {
    let bump = match refinement.kind {
        RefinementKind::Replace => VersionBump::Major,
        _ => VersionBump::Minor,
    };
    let mut next = refinement.changes.apply(method);
    let now = Utc::now();
    next.id = format!("method-{}", Uuid::new_v4());
    next.version = bump_version(&method.version, bump)?;
    next.status = MethodStatus::Active;
    next.metrics = SuccessMetrics::default();
    next.created_at = now;
    next.updated_at = now;
    Ok(next)
}

fn outcome_from_status(status: ExecutionStatus) -> LearningOutcome {
    match status {
        ExecutionStatus::Completed => LearningOutcome::Success,
        ExecutionStatus::Partial => LearningOutcome::PartialSuccess,
        _ => LearningOutcome::InsufficientData,
    }
}

fn cancel_reason(err: &ExecutorError) -> CancelReason {
    match err {
        ExecutorError::Cancelled(reason) => *reason,
        _ => CancelReason::Cancelled,
    }
}

fn cancelled(mut result: LearningResult, reason: CancelReason) -> LearningRunError {
    tracing::warn!(%reason, "learning loop cancelled");
    result.completed_at = Some(Utc::now());
    LearningRunError::new(result, LearningError::Cancelled(reason))
}

fn fatal(mut result: LearningResult, error: LearningError) -> LearningRunError {
    tracing::error!(%error, "learning loop aborted");
    result.completed_at = Some(Utc::now());
    LearningRunError::new(result, error)
}
