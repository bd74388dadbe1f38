use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use cadence_core::api::{
    ApproachStep, ExecutionPlan, ExecutionTask, Method, Objective, Planner, TaskDependency,
};

pub const STEP_PRIORITY: u8 = 5;

/// Deterministic planner: one task per approach step.
///
/// Step heuristics of the form `key: value` become task settings:
/// - `command: <shell>` sets the `command` parameter
/// - `input: <reference>` adds an input reference
/// - `priority: <1-10>` overrides the default priority
/// - `tokens: <n>` sets the token estimate
///
/// Other heuristics are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepPlanner;

impl StepPlanner {
    pub fn new() -> Self {
        Self
    }

    fn task_for(&self, index: usize, step: &ApproachStep) -> ExecutionTask {
        let mut task = ExecutionTask::new(step_task_id(index), step.effective_task_type())
            .with_description(if step.description.is_empty() {
                step.name.as_str()
            } else {
                step.description.as_str()
            })
            .with_priority(STEP_PRIORITY)
            .with_parameter("step", step.name.as_str());

        for heuristic in &step.heuristics {
            let Some((key, value)) = heuristic.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "command" => task = task.with_parameter("command", value),
                "input" => task = task.with_input_ref(value),
                "priority" => {
                    if let Ok(priority) = value.parse::<u8>() {
                        task = task.with_priority(priority.clamp(1, 10));
                    }
                }
                "tokens" => {
                    if let Ok(tokens) = value.parse::<u32>() {
                        task = task.with_estimated_tokens(tokens);
                    }
                }
                _ => {}
            }
        }
        task
    }
}

fn step_task_id(index: usize) -> String {
    format!("step-{}", index + 1)
}

#[async_trait]
impl Planner for StepPlanner {
    fn name(&self) -> &str {
        "step"
    }

    async fn create_plan(&self, objective: &Objective, method: &Method) -> Result<ExecutionPlan> {
        if method.approach.is_empty() {
            anyhow::bail!("method '{}' has no approach steps", method.id);
        }

        let by_name: HashMap<&str, String> = method
            .approach
            .iter()
            .enumerate()
            .map(|(idx, step)| (step.name.as_str(), step_task_id(idx)))
            .collect();

        let mut tasks = Vec::with_capacity(method.approach.len());
        let mut dependencies = Vec::new();
        for (idx, step) in method.approach.iter().enumerate() {
            let task = self.task_for(idx, step);

            if step.depends_on.is_empty() {
                if idx > 0 {
                    dependencies.push(
                        TaskDependency::new(&task.id, step_task_id(idx - 1))
                            .with_reason("previous step"),
                    );
                }
            } else {
                for name in &step.depends_on {
                    let Some(prerequisite) = by_name.get(name.as_str()) else {
                        anyhow::bail!(
                            "step '{}' of method '{}' depends on unknown step '{}'",
                            step.name,
                            method.id,
                            name
                        );
                    };
                    dependencies.push(
                        TaskDependency::new(&task.id, prerequisite)
                            .with_reason(format!("step '{name}'")),
                    );
                }
            }
            tasks.push(task);
        }

        let plan = ExecutionPlan::new(&objective.id, &method.id, tasks, dependencies);
        tracing::debug!(
            plan_id = %plan.id,
            method_id = %method.id,
            tasks = plan.tasks.len(),
            "plan created from method steps"
        );
        Ok(plan)
    }
}
