//! Plan execution
//!
//! ```text
//! ExecutionPlan
//!   ↓
//! ExecutionPlan::validate()
//!   ↓
//! TaskGraph::from_plan() → resolve_order()   (DFS, cycle = error)
//!   ↓
//! PlanExecutor::execute_plan()
//!   └─ RetryingExecutor::run() per task      (ContextLoader + TaskExecutor)
//!   ↓
//! ExecutionResult + RefinementFeedback
//! ```

pub mod cancel;
mod engine;
mod graph;
mod progress;
pub mod rating;
mod retry;
pub mod traits;
pub mod types;

pub use cancel::{CancelReason, CancelSignal};
pub use engine::{PlanExecutor, PlanExecutorBuilder};
pub use graph::TaskGraph;
pub use progress::ProgressMonitor;
pub use retry::RetryingExecutor;
pub use types::{
    ExecutionPlan, ExecutionResult, ExecutionTask, RefinementFeedback, RetryConfig,
    TaskContext, TaskDependency, TaskOutput, TaskResult,
};
