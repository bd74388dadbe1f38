use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::executor::types::RetryConfig;
use crate::learning::LearningLoopConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub learning: LearningLoopConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub events_out: EventsOutConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        self.learning.validate()?;
        if self.events_out.enabled && self.events_out.path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "events_out.path must be set when events_out.enabled = true".into(),
            ));
        }
        if self.events_out.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "events_out.channel_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "cadence_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Jsonl,
}

impl std::str::FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "jsonl" => Ok(Self::Jsonl),
            other => Err(ConfigError::Invalid(format!(
                "unknown output format '{other}' (expected text or jsonl)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Draw progress bars in text mode when stderr is a terminal.
    #[serde(default = "default_progress_bar")]
    pub progress_bar: bool,
}

fn default_progress_bar() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            progress_bar: default_progress_bar(),
        }
    }
}

/// Append-only JSONL audit of execution events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsOutConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_events_path")]
    pub path: String,
    /// Lines buffered between the executor and the writer task.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Drop lines (and count them) instead of waiting when the buffer is full.
    #[serde(default = "default_drop_when_full")]
    pub drop_when_full: bool,
}

fn default_events_path() -> String {
    "./cadence.events.jsonl".to_string()
}

fn default_channel_capacity() -> usize {
    2048
}

fn default_drop_when_full() -> bool {
    true
}

impl Default for EventsOutConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_events_path(),
            channel_capacity: default_channel_capacity(),
            drop_when_full: default_drop_when_full(),
        }
    }
}
