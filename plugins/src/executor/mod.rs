//! Task executors

mod command;
mod dry_run;

pub use command::{CommandExecutor, COMMAND_PARAM, TIMEOUT_PARAM};
pub use dry_run::DryRunExecutor;
