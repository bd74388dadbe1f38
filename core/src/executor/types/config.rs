use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Retry policy applied to every task attempt.
///
/// Immutable for the duration of a plan run; replace it between runs through
/// [`PlanExecutor::set_retry_config`](crate::executor::PlanExecutor::set_retry_config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// An error is retriable when its message contains any of these substrings
    #[serde(default = "default_retriable_errors")]
    pub retriable_errors: Vec<String>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_retriable_errors() -> Vec<String> {
    vec![
        "timeout".to_string(),
        "rate_limit".to_string(),
        "temporary_unavailable".to_string(),
        "network_error".to_string(),
    ]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            retriable_errors: default_retriable_errors(),
        }
    }
}

impl RetryConfig {
    /// Total executor invocations allowed for one task.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after the failed attempt number `attempt` (1-based):
    /// `min(base * multiplier^(attempt-1), max)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exp);
        let capped = if raw.is_finite() {
            raw.min(self.max_delay_ms as f64)
        } else {
            self.max_delay_ms as f64
        };
        Duration::from_millis(capped.max(0.0) as u64)
    }

    pub fn is_retriable(&self, error: &str) -> bool {
        self.retriable_errors
            .iter()
            .any(|marker| !marker.is_empty() && error.contains(marker.as_str()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier <= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "retry.backoff_multiplier must be > 1.0 (got {})",
                self.backoff_multiplier
            )));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.max_delay_ms ({}) must be >= retry.base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        Ok(())
    }
}
