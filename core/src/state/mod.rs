//! Task and plan status tracking.
//!
//! Every status change made by the executor goes through [`StateTransition`], so a
//! result can never move backwards out of a terminal state.

pub mod transitions;
pub mod types;

pub use transitions::{StateTransition, TransitionError};
pub use types::{ExecutionStatus, TaskStatus};
