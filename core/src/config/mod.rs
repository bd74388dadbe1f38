mod load;
mod types;

pub use load::{
    apply_env_overrides, get_cadence_data_dir, load, load_default, read_file, ENV_LOG_LEVEL,
    ENV_MAX_REFINEMENT_ATTEMPTS, ENV_MAX_RETRIES, ENV_OUTPUT_FORMAT,
};
pub use types::{AppConfig, EventsOutConfig, LoggingConfig, OutputConfig, OutputFormat};
