use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ExecutorError;

use super::task::{ExecutionTask, TaskDependency, MAX_PRIORITY, MIN_PRIORITY};

/// Concrete, dependency-annotated set of tasks derived from a method for one objective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: String,
    pub objective_id: String,
    #[serde(default)]
    pub method_id: String,
    pub tasks: Vec<ExecutionTask>,
    #[serde(default)]
    pub dependencies: Vec<TaskDependency>,
    /// Sum of the tasks' token estimates
    #[serde(default)]
    pub estimated_tokens: u64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ExecutionPlan {
    pub fn new(
        objective_id: impl Into<String>,
        method_id: impl Into<String>,
        tasks: Vec<ExecutionTask>,
        dependencies: Vec<TaskDependency>,
    ) -> Self {
        let estimated_tokens = tasks.iter().map(|t| u64::from(t.estimated_tokens)).sum();
        Self {
            id: format!("plan-{}", Uuid::new_v4()),
            objective_id: objective_id.into(),
            method_id: method_id.into(),
            tasks,
            dependencies,
            estimated_tokens,
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn task(&self, id: &str) -> Option<&ExecutionTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Structural validation, run before any dependency resolution or execution.
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.id.trim().is_empty() {
            return Err(ExecutorError::InvalidPlan("plan id is empty".into()));
        }
        if self.objective_id.trim().is_empty() {
            return Err(ExecutorError::InvalidPlan(format!(
                "plan '{}' has no objective reference",
                self.id
            )));
        }
        if self.tasks.is_empty() {
            return Err(ExecutorError::InvalidPlan(format!(
                "plan '{}' has no tasks",
                self.id
            )));
        }

        let mut seen = HashSet::with_capacity(self.tasks.len());
        for (idx, task) in self.tasks.iter().enumerate() {
            if task.id.trim().is_empty() {
                return Err(ExecutorError::InvalidPlan(format!(
                    "task #{idx} has an empty id"
                )));
            }
            if task.task_type.trim().is_empty() {
                return Err(ExecutorError::InvalidPlan(format!(
                    "task '{}' has an empty type",
                    task.id
                )));
            }
            if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&task.priority()) {
                return Err(ExecutorError::InvalidPlan(format!(
                    "task '{}' priority {} is outside {MIN_PRIORITY}..={MAX_PRIORITY}",
                    task.id,
                    task.priority()
                )));
            }
            if !seen.insert(task.id.as_str()) {
                return Err(ExecutorError::DuplicateTaskId(task.id.clone()));
            }
        }

        for dep in &self.dependencies {
            if !seen.contains(dep.task_id.as_str()) {
                return Err(ExecutorError::UnknownTask(dep.task_id.clone()));
            }
            if !seen.contains(dep.depends_on.as_str()) {
                return Err(ExecutorError::DependencyNotFound {
                    task_id: dep.task_id.clone(),
                    missing_dep: dep.depends_on.clone(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(tasks: Vec<ExecutionTask>, deps: Vec<TaskDependency>) -> ExecutionPlan {
        ExecutionPlan::new("obj-1", "method-1", tasks, deps)
    }

    #[test]
    fn new_sums_token_estimates() {
        let p = plan(
            vec![
                ExecutionTask::new("a", "fetch").with_estimated_tokens(100),
                ExecutionTask::new("b", "fetch").with_estimated_tokens(250),
            ],
            vec![],
        );
        assert_eq!(p.estimated_tokens, 350);
        assert!(p.id.starts_with("plan-"));
    }

    #[test]
    fn validate_accepts_well_formed_plan() {
        let p = plan(
            vec![ExecutionTask::new("a", "fetch"), ExecutionTask::new("b", "parse")],
            vec![TaskDependency::new("b", "a")],
        );
        assert!(p.validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_objective_and_empty_tasks() {
        let mut p = plan(vec![ExecutionTask::new("a", "fetch")], vec![]);
        p.objective_id.clear();
        assert!(matches!(p.validate(), Err(ExecutorError::InvalidPlan(_))));

        let p = plan(vec![], vec![]);
        assert!(matches!(p.validate(), Err(ExecutorError::InvalidPlan(_))));
    }

    #[test]
    fn validate_rejects_task_without_type() {
        let p = plan(vec![ExecutionTask::new("a", " ")], vec![]);
        assert!(matches!(p.validate(), Err(ExecutorError::InvalidPlan(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_priority() {
        let p = plan(vec![ExecutionTask::new("a", "x").with_priority(11)], vec![]);
        assert!(matches!(p.validate(), Err(ExecutorError::InvalidPlan(_))));
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let p = plan(
            vec![ExecutionTask::new("a", "x"), ExecutionTask::new("a", "y")],
            vec![],
        );
        assert!(matches!(p.validate(), Err(ExecutorError::DuplicateTaskId(id)) if id == "a"));
    }

    #[test]
    fn validate_rejects_unknown_dependency() {
        let p = plan(
            vec![ExecutionTask::new("a", "x")],
            vec![TaskDependency::new("a", "ghost")],
        );
        match p.validate() {
            Err(ExecutorError::DependencyNotFound {
                task_id,
                missing_dep,
            }) => {
                assert_eq!(task_id, "a");
                assert_eq!(missing_dep, "ghost");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
