//! Reference collaborators for `cadence-core`: storage, planning, task execution,
//! context loading, learning and observers.

pub mod agent;
pub mod context;
pub mod executor;
pub mod factory;
pub mod observer;
pub mod planner;
pub mod store;
