//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `cadence_core::api` instead of reaching into internal modules.

pub use crate::config::{
    load, load_default, AppConfig, EventsOutConfig, LoggingConfig, OutputConfig, OutputFormat,
};
pub use crate::error::{
    CliError, ConfigError, ExecutorError, LearningError, LearningRunError, LedgerError,
    PlanRunError, StoreError, TaskRunError,
};
pub use crate::executor::traits::{
    ContextLoader, CriticalityPolicy, DefaultCriticality, EmptyContextLoader, ExecutionEvent,
    ExecutionObserver, ExecutionStore, FanoutObserver, ResolvedContext, TaskExecutor,
    TracingObserver,
};
pub use crate::executor::{
    rating, CancelReason, CancelSignal, ExecutionPlan, ExecutionResult, ExecutionTask,
    PlanExecutor, PlanExecutorBuilder, ProgressMonitor, RefinementFeedback, RetryConfig,
    RetryingExecutor, TaskContext, TaskDependency, TaskGraph, TaskOutput, TaskResult,
};
pub use crate::learning::{
    ApproachStep, AttemptResult, ExecutionAnalysis, LearningAgent, LearningLoop,
    LearningLoopConfig, LearningOutcome, LearningResult, Method, MethodDomain, MethodPatch,
    MethodRefinement, MethodStatus, Objective, Planner, Recommendation, RefinementEvaluation,
    RefinementKind, SuccessMetrics,
};
pub use crate::ledger::{bump_version, EvolutionEdge, MethodLedger, MethodStore, VersionBump};
pub use crate::state::{ExecutionStatus, TaskStatus};
