use async_trait::async_trait;

use crate::executor::types::{ExecutionPlan, ExecutionResult};

use super::types::{
    ExecutionAnalysis, Method, MethodRefinement, Objective, RefinementEvaluation,
};

/// Turns an objective and a method into a concrete plan
#[async_trait]
pub trait Planner: Send + Sync {
    fn name(&self) -> &str;

    async fn create_plan(&self, objective: &Objective, method: &Method)
        -> anyhow::Result<ExecutionPlan>;
}

/// Judges execution outcomes and proposes method changes.
///
/// Every call may fail; the learning loop treats failures as missing input.
#[async_trait]
pub trait LearningAgent: Send + Sync {
    fn name(&self) -> &str;

    async fn analyze_outcome(
        &self,
        result: &ExecutionResult,
        plan: &ExecutionPlan,
        method: &Method,
    ) -> anyhow::Result<ExecutionAnalysis>;

    async fn propose_refinement(
        &self,
        analysis: &ExecutionAnalysis,
        method: &Method,
    ) -> anyhow::Result<MethodRefinement>;

    async fn evaluate_refinement(
        &self,
        method: &Method,
        refinement: &MethodRefinement,
    ) -> anyhow::Result<RefinementEvaluation>;
}
