#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cadence_core::api::{
    ApproachStep, EvolutionEdge, ExecutionAnalysis, ExecutionEvent, ExecutionObserver,
    ExecutionPlan, ExecutionResult, ExecutionStore, ExecutionTask, LearningAgent, LearningOutcome,
    Method, MethodPatch, MethodRefinement, MethodStore, Objective, Planner, Recommendation,
    RefinementEvaluation, RefinementKind, ResolvedContext, StoreError, TaskDependency,
    TaskExecutor, TaskOutput,
};
use cadence_plugins::store::InMemoryStore;

/// Outcome of one scripted executor call
#[derive(Debug, Clone)]
pub enum Attempt {
    Ok { confidence: f64, tokens: u32 },
    Fail(&'static str),
}

pub fn ok() -> Attempt {
    Attempt::Ok {
        confidence: 0.9,
        tokens: 10,
    }
}

pub fn fail(message: &'static str) -> Attempt {
    Attempt::Fail(message)
}

/// Executor driven by per-task scripts. The last entry of a script repeats; tasks
/// without a script succeed.
#[derive(Default)]
pub struct ScriptedExecutor {
    scripts: Mutex<HashMap<String, VecDeque<Attempt>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, task_id: &str, attempts: Vec<Attempt>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(task_id.to_string(), attempts.into());
        self
    }

    /// Task ids in call order, one entry per attempt
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, task_id: &str) -> usize {
        self.calls().iter().filter(|id| *id == task_id).count()
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(
        &self,
        task: &ExecutionTask,
        _context: &ResolvedContext,
    ) -> anyhow::Result<TaskOutput> {
        self.calls.lock().unwrap().push(task.id.clone());
        let attempt = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(&task.id) {
                Some(script) if script.len() > 1 => script.pop_front().unwrap(),
                Some(script) => script.front().cloned().unwrap_or_else(ok),
                None => ok(),
            }
        };
        match attempt {
            Attempt::Ok { confidence, tokens } => Ok(TaskOutput {
                output: serde_json::json!({ "task": task.id }),
                tokens_used: tokens,
                confidence,
                ..Default::default()
            }),
            Attempt::Fail(message) => Err(anyhow::anyhow!(message)),
        }
    }
}

/// Collects every event type it sees
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl RecordingObserver {
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type())
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                ExecutionEvent::Warning { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ExecutionObserver for RecordingObserver {
    fn name(&self) -> &str {
        "recording"
    }

    fn on_event(&self, event: &ExecutionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Real in-memory store seeded with objectives and methods
pub async fn store_with(objectives: Vec<Objective>, methods: Vec<Method>) -> Arc<InMemoryStore> {
    let store = InMemoryStore::new();
    for objective in objectives {
        store.save_objective(&objective).await.unwrap();
    }
    for method in methods {
        store.create_method(&method).await.unwrap();
    }
    Arc::new(store)
}

/// Reads and creations go to an [`InMemoryStore`]; metric updates and audit writes fail.
#[derive(Default)]
pub struct ReadOnlyStore {
    inner: InMemoryStore,
}

impl ReadOnlyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MethodStore for ReadOnlyStore {
    async fn get_objective(&self, id: &str) -> Result<Objective, StoreError> {
        self.inner.get_objective(id).await
    }

    async fn save_objective(&self, objective: &Objective) -> Result<(), StoreError> {
        self.inner.save_objective(objective).await
    }

    async fn get_method(&self, id: &str) -> Result<Method, StoreError> {
        self.inner.get_method(id).await
    }

    async fn create_method(&self, method: &Method) -> Result<(), StoreError> {
        self.inner.create_method(method).await
    }

    async fn update_method(&self, _id: &str, _patch: &MethodPatch) -> Result<Method, StoreError> {
        Err(StoreError::Backend(anyhow::anyhow!("read-only store")))
    }

    async fn list_methods(&self) -> Result<Vec<Method>, StoreError> {
        self.inner.list_methods().await
    }

    async fn add_evolution(&self, edge: &EvolutionEdge) -> Result<(), StoreError> {
        self.inner.add_evolution(edge).await
    }

    async fn predecessors(&self, id: &str) -> Result<Vec<EvolutionEdge>, StoreError> {
        self.inner.predecessors(id).await
    }

    async fn successors(&self, id: &str) -> Result<Vec<EvolutionEdge>, StoreError> {
        self.inner.successors(id).await
    }
}

#[async_trait]
impl ExecutionStore for ReadOnlyStore {
    async fn save_plan(&self, _plan: &ExecutionPlan) -> Result<(), StoreError> {
        Err(StoreError::Backend(anyhow::anyhow!("disk full")))
    }

    async fn save_result(&self, _result: &ExecutionResult) -> Result<(), StoreError> {
        Err(StoreError::Backend(anyhow::anyhow!("disk full")))
    }
}

/// One task per step, chained in step order
#[derive(Default)]
pub struct ChainPlanner {
    pub fail: bool,
    calls: Mutex<usize>,
}

impl ChainPlanner {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Planner for ChainPlanner {
    fn name(&self) -> &str {
        "chain"
    }

    async fn create_plan(
        &self,
        objective: &Objective,
        method: &Method,
    ) -> anyhow::Result<ExecutionPlan> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            anyhow::bail!("planner backend unavailable");
        }
        let tasks: Vec<_> = method
            .approach
            .iter()
            .map(|step| ExecutionTask::new(&step.name, step.effective_task_type()))
            .collect();
        let deps = tasks
            .windows(2)
            .map(|w| TaskDependency::new(&w[1].id, &w[0].id))
            .collect();
        Ok(ExecutionPlan::new(&objective.id, &method.id, tasks, deps))
    }
}

/// Learning agent with fixed answers
pub struct ScriptedAgent {
    pub assessment: Option<LearningOutcome>,
    pub kind: RefinementKind,
    pub recommendation: Recommendation,
    pub complexity_reduction: f64,
    pub new_approach: Option<Vec<ApproachStep>>,
    proposals: Mutex<usize>,
}

impl ScriptedAgent {
    pub fn new(assessment: LearningOutcome) -> Self {
        Self {
            assessment: Some(assessment),
            kind: RefinementKind::Modify,
            recommendation: Recommendation::Apply,
            complexity_reduction: 1.0,
            new_approach: None,
            proposals: Mutex::new(0),
        }
    }

    /// `analyze_outcome` always fails
    pub fn broken() -> Self {
        Self {
            assessment: None,
            ..Self::new(LearningOutcome::MethodFailure)
        }
    }

    pub fn proposing(mut self, kind: RefinementKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn recommending(mut self, recommendation: Recommendation) -> Self {
        self.recommendation = recommendation;
        self
    }

    pub fn with_complexity_reduction(mut self, reduction: f64) -> Self {
        self.complexity_reduction = reduction;
        self
    }

    pub fn with_new_approach(mut self, approach: Vec<ApproachStep>) -> Self {
        self.new_approach = Some(approach);
        self
    }

    pub fn proposals(&self) -> usize {
        *self.proposals.lock().unwrap()
    }
}

#[async_trait]
impl LearningAgent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn analyze_outcome(
        &self,
        _result: &ExecutionResult,
        _plan: &ExecutionPlan,
        _method: &Method,
    ) -> anyhow::Result<ExecutionAnalysis> {
        match self.assessment {
            Some(assessment) => Ok(ExecutionAnalysis::new(assessment)),
            None => anyhow::bail!("analysis model timed out"),
        }
    }

    async fn propose_refinement(
        &self,
        _analysis: &ExecutionAnalysis,
        _method: &Method,
    ) -> anyhow::Result<MethodRefinement> {
        *self.proposals.lock().unwrap() += 1;
        Ok(MethodRefinement {
            kind: self.kind,
            rationale: "scripted".into(),
            changes: MethodPatch {
                approach: self.new_approach.clone(),
                ..Default::default()
            },
        })
    }

    async fn evaluate_refinement(
        &self,
        _method: &Method,
        _refinement: &MethodRefinement,
    ) -> anyhow::Result<RefinementEvaluation> {
        Ok(RefinementEvaluation {
            recommendation: self.recommendation,
            expected_success_gain: 0.1,
            complexity_reduction: self.complexity_reduction,
            reasoning: "scripted".into(),
        })
    }
}

pub fn method_with_metrics(id: &str, executions: u32, successes: u32) -> Method {
    let mut method = Method::new(
        id,
        "fetch-and-report",
        vec![ApproachStep::new("fetch"), ApproachStep::new("report")],
    );
    method.metrics.execution_count = executions;
    method.metrics.success_count = successes;
    method
}
