use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use cadence_core::api::{
    EvolutionEdge, ExecutionPlan, ExecutionResult, ExecutionStore, Method, MethodPatch,
    MethodStore, Objective, StoreError,
};

use super::Catalog;

/// Process-local store. Holds methods, objectives, evolution edges and the audit
/// trail of executed plans; nothing survives the process.
#[derive(Default)]
pub struct InMemoryStore {
    objectives: RwLock<HashMap<String, Objective>>,
    methods: RwLock<HashMap<String, Method>>,
    edges: RwLock<Vec<EvolutionEdge>>,
    plans: RwLock<HashMap<String, ExecutionPlan>>,
    results: RwLock<Vec<ExecutionResult>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        let methods = catalog
            .methods
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();
        let objectives = catalog
            .objectives
            .into_iter()
            .map(|o| (o.id.clone(), o))
            .collect();
        Self {
            objectives: RwLock::new(objectives),
            methods: RwLock::new(methods),
            ..Default::default()
        }
    }

    pub async fn method_count(&self) -> usize {
        self.methods.read().await.len()
    }

    pub async fn plan_count(&self) -> usize {
        self.plans.read().await.len()
    }

    pub async fn plan(&self, id: &str) -> Option<ExecutionPlan> {
        self.plans.read().await.get(id).cloned()
    }

    /// Results in the order they were saved
    pub async fn results(&self) -> Vec<ExecutionResult> {
        self.results.read().await.clone()
    }
}

#[async_trait]
impl MethodStore for InMemoryStore {
    async fn get_objective(&self, id: &str) -> Result<Objective, StoreError> {
        self.objectives
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("objective", id))
    }

    async fn save_objective(&self, objective: &Objective) -> Result<(), StoreError> {
        self.objectives
            .write()
            .await
            .insert(objective.id.clone(), objective.clone());
        Ok(())
    }

    async fn get_method(&self, id: &str) -> Result<Method, StoreError> {
        self.methods
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("method", id))
    }

    async fn create_method(&self, method: &Method) -> Result<(), StoreError> {
        let mut methods = self.methods.write().await;
        if methods.contains_key(&method.id) {
            return Err(StoreError::already_exists("method", &method.id));
        }
        methods.insert(method.id.clone(), method.clone());
        Ok(())
    }

    async fn update_method(&self, id: &str, patch: &MethodPatch) -> Result<Method, StoreError> {
        let mut methods = self.methods.write().await;
        let current = methods
            .get(id)
            .ok_or_else(|| StoreError::not_found("method", id))?;
        let next = patch.apply(current);
        methods.insert(id.to_string(), next.clone());
        Ok(next)
    }

    async fn list_methods(&self) -> Result<Vec<Method>, StoreError> {
        let mut methods: Vec<Method> = self.methods.read().await.values().cloned().collect();
        methods.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(methods)
    }

    async fn add_evolution(&self, edge: &EvolutionEdge) -> Result<(), StoreError> {
        self.edges.write().await.push(edge.clone());
        Ok(())
    }

    async fn predecessors(&self, id: &str) -> Result<Vec<EvolutionEdge>, StoreError> {
        Ok(self
            .edges
            .read()
            .await
            .iter()
            .filter(|e| e.successor_id == id)
            .cloned()
            .collect())
    }

    async fn successors(&self, id: &str) -> Result<Vec<EvolutionEdge>, StoreError> {
        Ok(self
            .edges
            .read()
            .await
            .iter()
            .filter(|e| e.predecessor_id == id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ExecutionStore for InMemoryStore {
    async fn save_plan(&self, plan: &ExecutionPlan) -> Result<(), StoreError> {
        self.plans
            .write()
            .await
            .insert(plan.id.clone(), plan.clone());
        Ok(())
    }

    async fn save_result(&self, result: &ExecutionResult) -> Result<(), StoreError> {
        self.results.write().await.push(result.clone());
        Ok(())
    }
}
