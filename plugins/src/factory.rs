use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use cadence_core::api::{
    AppConfig, ContextLoader, ExecutionObserver, ExecutionStore, FanoutObserver,
    LearningAgent, LearningLoop, MethodStore, OutputFormat, PlanExecutor, Planner, TaskExecutor,
    TracingObserver,
};

use crate::agent::HeuristicLearningAgent;
use crate::context::ReferenceContextLoader;
use crate::executor::{CommandExecutor, DryRunExecutor};
use crate::observer::{JsonlObserver, TextObserver};
use crate::planner::StepPlanner;
use crate::store::InMemoryStore;

/// The observer handed to executors plus the JSONL sinks behind it, which must be
/// drained with [`ObserverSet::finish`] before the process exits.
pub struct ObserverSet {
    pub observer: Arc<dyn ExecutionObserver>,
    sinks: Vec<Arc<JsonlObserver>>,
}

impl ObserverSet {
    pub async fn finish(&self) {
        for sink in &self.sinks {
            sink.finish().await;
        }
    }
}

/// Observers for the configured output format, plus the events file when enabled.
///
/// `progress` should already account for whether stderr is a terminal.
pub async fn build_observers(cfg: &AppConfig, progress: bool) -> Result<ObserverSet> {
    let mut fanout = FanoutObserver::new(vec![Arc::new(TracingObserver)]);
    let mut sinks = Vec::new();

    match cfg.output.format {
        OutputFormat::Text => fanout.push(Arc::new(TextObserver::new(
            progress && cfg.output.progress_bar,
        ))),
        OutputFormat::Jsonl => sinks.push(Arc::new(JsonlObserver::stdout(&cfg.events_out))),
    }

    if cfg.events_out.enabled && !cfg.events_out.path.trim().is_empty() {
        sinks.push(Arc::new(JsonlObserver::open(&cfg.events_out).await?));
    }

    for sink in &sinks {
        fanout.push(sink.clone());
    }

    Ok(ObserverSet {
        observer: Arc::new(fanout),
        sinks,
    })
}

pub fn build_executor(dry_run: bool, timeout: Duration) -> Arc<dyn TaskExecutor> {
    if dry_run {
        Arc::new(DryRunExecutor)
    } else {
        Arc::new(CommandExecutor::new(timeout))
    }
}

pub fn build_context_loader() -> Arc<dyn ContextLoader> {
    Arc::new(ReferenceContextLoader::new())
}

pub fn build_plan_executor(
    cfg: &AppConfig,
    executor: Arc<dyn TaskExecutor>,
    observer: Arc<dyn ExecutionObserver>,
    store: Option<Arc<dyn ExecutionStore>>,
) -> PlanExecutor {
    let mut builder = PlanExecutor::builder(executor, build_context_loader())
        .observer(observer)
        .retry_config(cfg.retry.clone());
    if let Some(store) = store {
        builder = builder.store(store);
    }
    builder.build()
}

/// Learning loop over `store` with the step planner and heuristic agent.
pub fn build_learning_loop(
    cfg: &AppConfig,
    store: Arc<InMemoryStore>,
    executor: Arc<dyn TaskExecutor>,
    observer: Arc<dyn ExecutionObserver>,
) -> LearningLoop {
    let planner: Arc<dyn Planner> = Arc::new(StepPlanner::new());
    let agent: Arc<dyn LearningAgent> = Arc::new(HeuristicLearningAgent::new());
    let method_store: Arc<dyn MethodStore> = store.clone();
    let execution_store: Arc<dyn ExecutionStore> = store;
    let plan_executor = build_plan_executor(cfg, executor, observer, Some(execution_store));
    LearningLoop::new(planner, plan_executor, agent, method_store).with_config(cfg.learning.clone())
}
