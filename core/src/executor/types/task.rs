use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;
pub const DEFAULT_PRIORITY: u8 = 5;

/// Minimal execution context carried by a task.
///
/// Only references are stored here; the concrete values are resolved lazily by a
/// [`ContextLoader`](crate::executor::traits::ContextLoader) right before an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    #[serde(default)]
    pub input_refs: Vec<String>,
    #[serde(default)]
    pub output_ref: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub token_budget: u32,
    /// 1 (lowest) to 10 (highest)
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

impl Default for TaskContext {
    fn default() -> Self {
        Self {
            input_refs: Vec::new(),
            output_ref: None,
            parameters: HashMap::new(),
            token_budget: 0,
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// Unit of work inside an [`ExecutionPlan`](super::ExecutionPlan)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTask {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub context: TaskContext,
    #[serde(default)]
    pub estimated_tokens: u32,
}

impl ExecutionTask {
    pub fn new(id: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            description: String::new(),
            context: TaskContext::default(),
            estimated_tokens: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.context.priority = priority;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_input_ref(mut self, reference: impl Into<String>) -> Self {
        self.context.input_refs.push(reference.into());
        self
    }

    pub fn with_estimated_tokens(mut self, tokens: u32) -> Self {
        self.estimated_tokens = tokens;
        self
    }

    pub fn priority(&self) -> u8 {
        self.context.priority
    }
}

/// Directed prerequisite edge: `task_id` runs only after `depends_on` finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDependency {
    pub task_id: String,
    pub depends_on: String,
    #[serde(default)]
    pub reason: String,
}

impl TaskDependency {
    pub fn new(task_id: impl Into<String>, depends_on: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            depends_on: depends_on.into(),
            reason: String::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}
