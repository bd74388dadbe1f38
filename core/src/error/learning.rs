use thiserror::Error;

use crate::executor::cancel::CancelReason;
use crate::learning::types::LearningResult;

use super::store::{LedgerError, StoreError};

#[derive(Error, Debug)]
pub enum LearningError {
    #[error("Objective not found: {0}")]
    ObjectiveNotFound(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Planner failed for objective '{objective_id}': {message}")]
    Planner {
        objective_id: String,
        message: String,
    },

    #[error("Execution cancelled: {0}")]
    Cancelled(CancelReason),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl LearningError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// A learning loop call that could not finish normally. Attempts recorded before
/// the failure are kept in `result`.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct LearningRunError {
    pub result: Box<LearningResult>,
    #[source]
    pub error: LearningError,
}

impl LearningRunError {
    pub fn new(result: LearningResult, error: LearningError) -> Self {
        Self {
            result: Box::new(result),
            error,
        }
    }
}
