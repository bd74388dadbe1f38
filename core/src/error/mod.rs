#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;
pub mod learning;
pub mod store;

pub use error::{CliError, ConfigError};
pub use executor::{ExecutorError, PlanRunError, TaskRunError};
pub use learning::{LearningError, LearningRunError};
pub use store::{LedgerError, StoreError};
