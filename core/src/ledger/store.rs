use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::learning::types::{Method, MethodPatch, Objective};

/// "`successor_id` evolved from `predecessor_id`"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionEdge {
    pub predecessor_id: String,
    pub successor_id: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl EvolutionEdge {
    pub fn new(
        predecessor_id: impl Into<String>,
        successor_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            predecessor_id: predecessor_id.into(),
            successor_id: successor_id.into(),
            reason: reason.into(),
            created_at: Utc::now(),
        }
    }
}

/// Objective and method persistence.
///
/// Implementations provide their own synchronization; the ledger and learning loop
/// call them from a single task at a time per objective.
#[async_trait]
pub trait MethodStore: Send + Sync {
    async fn get_objective(&self, id: &str) -> Result<Objective, StoreError>;

    async fn save_objective(&self, objective: &Objective) -> Result<(), StoreError>;

    async fn get_method(&self, id: &str) -> Result<Method, StoreError>;

    /// Fails with [`StoreError::AlreadyExists`] when the id is taken.
    async fn create_method(&self, method: &Method) -> Result<(), StoreError>;

    /// Apply `patch` and return the stored result.
    async fn update_method(&self, id: &str, patch: &MethodPatch) -> Result<Method, StoreError>;

    async fn list_methods(&self) -> Result<Vec<Method>, StoreError>;

    async fn add_evolution(&self, edge: &EvolutionEdge) -> Result<(), StoreError>;

    /// Direct predecessors of `id`, oldest edge first.
    async fn predecessors(&self, id: &str) -> Result<Vec<EvolutionEdge>, StoreError>;

    /// Direct successors of `id`, oldest edge first.
    async fn successors(&self, id: &str) -> Result<Vec<EvolutionEdge>, StoreError>;
}
