//! Dependency-ordered plan execution with retries, and a learning loop that
//! evolves the methods plans are derived from.
//!
//! Prefer importing from `cadence_core::api` in downstream crates.

pub mod api;
pub mod config;
pub mod error;
pub mod executor;
pub mod learning;
pub mod ledger;
pub mod state;
