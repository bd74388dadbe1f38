use async_trait::async_trait;

use crate::error::StoreError;
use crate::executor::types::{ExecutionPlan, ExecutionResult};

/// Audit sink for plans and their results.
///
/// Failures are reported by the plan executor as warnings; they never change the
/// outcome of a run.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn save_plan(&self, plan: &ExecutionPlan) -> Result<(), StoreError>;

    async fn save_result(&self, result: &ExecutionResult) -> Result<(), StoreError>;
}
