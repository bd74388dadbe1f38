//! Refinement controller (learning loop) and the method model it evolves

mod config;
mod controller;
mod traits;
pub mod types;

pub use config::LearningLoopConfig;
pub use controller::LearningLoop;
pub use traits::{LearningAgent, Planner};
pub use types::{
    ApproachStep, AttemptResult, ExecutionAnalysis, LearningOutcome, LearningResult, Method,
    MethodDomain, MethodPatch, MethodRefinement, MethodStatus, Objective, Recommendation,
    RefinementEvaluation, RefinementKind, SuccessMetrics,
};
