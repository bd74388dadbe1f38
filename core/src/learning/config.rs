use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Learning loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningLoopConfig {
    /// Executions a method needs before it may be refined
    #[serde(default = "default_min_executions")]
    pub min_executions_before_refinement: u32,

    /// Refine only when the method's success rate (percent) is below this
    #[serde(default = "default_success_threshold")]
    pub success_rate_threshold_for_refinement: f64,

    /// Upper bound on plan executions per objective call
    #[serde(default = "default_max_attempts")]
    pub max_refinement_attempts: u32,

    /// Above 0.5, refinements that do not reduce complexity are rejected
    #[serde(default = "default_complexity_bias")]
    pub complexity_bias_weight: f64,

    #[serde(default = "default_enable_evolution")]
    pub enable_method_evolution: bool,
}

fn default_min_executions() -> u32 {
    3
}

fn default_success_threshold() -> f64 {
    75.0
}

fn default_max_attempts() -> u32 {
    3
}

fn default_complexity_bias() -> f64 {
    0.7
}

fn default_enable_evolution() -> bool {
    true
}

impl Default for LearningLoopConfig {
    fn default() -> Self {
        Self {
            min_executions_before_refinement: default_min_executions(),
            success_rate_threshold_for_refinement: default_success_threshold(),
            max_refinement_attempts: default_max_attempts(),
            complexity_bias_weight: default_complexity_bias(),
            enable_method_evolution: default_enable_evolution(),
        }
    }
}

impl LearningLoopConfig {
    pub fn prefers_simpler_methods(&self) -> bool {
        self.complexity_bias_weight > 0.5
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_refinement_attempts == 0 {
            return Err(ConfigError::Invalid(
                "learning.max_refinement_attempts must be at least 1".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.success_rate_threshold_for_refinement) {
            return Err(ConfigError::Invalid(format!(
                "learning.success_rate_threshold_for_refinement must be within 0..=100 (got {})",
                self.success_rate_threshold_for_refinement
            )));
        }
        if !(0.0..=1.0).contains(&self.complexity_bias_weight) {
            return Err(ConfigError::Invalid(format!(
                "learning.complexity_bias_weight must be within 0..=1 (got {})",
                self.complexity_bias_weight
            )));
        }
        Ok(())
    }
}
