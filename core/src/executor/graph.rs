use std::collections::HashMap;

use crate::error::ExecutorError;
use crate::executor::types::{ExecutionPlan, ExecutionTask, TaskDependency};

/// DFS visit state for cycle detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Task dependency graph (DAG)
#[derive(Debug, Clone)]
pub struct TaskGraph<'a> {
    /// Task nodes: task_id -> Task
    pub nodes: HashMap<&'a str, &'a ExecutionTask>,

    /// Dependency edges: task_id -> list of prerequisites, in edge input order
    pub edges: HashMap<&'a str, Vec<&'a str>>,

    /// Reverse edges: task_id -> list of tasks that depend on it
    pub reverse_edges: HashMap<&'a str, Vec<&'a str>>,

    /// Original insertion order (for stable sorting)
    insertion_order: Vec<&'a str>,
}

impl<'a> TaskGraph<'a> {
    pub fn from_plan(plan: &'a ExecutionPlan) -> Result<Self, ExecutorError> {
        Self::from_parts(&plan.tasks, &plan.dependencies)
    }

    /// Construct the graph and validate every edge endpoint.
    ///
    /// Unknown references fail here, before any traversal starts.
    pub fn from_parts(
        tasks: &'a [ExecutionTask],
        dependencies: &'a [TaskDependency],
    ) -> Result<Self, ExecutorError> {
        let mut nodes = HashMap::with_capacity(tasks.len());
        let mut edges: HashMap<&str, Vec<&str>> = HashMap::with_capacity(tasks.len());
        let mut reverse_edges: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut insertion_order = Vec::with_capacity(tasks.len());

        for task in tasks {
            let id = task.id.as_str();
            if nodes.insert(id, task).is_some() {
                return Err(ExecutorError::DuplicateTaskId(task.id.clone()));
            }
            edges.insert(id, Vec::new());
            insertion_order.push(id);
        }

        for dep in dependencies {
            if !nodes.contains_key(dep.task_id.as_str()) {
                return Err(ExecutorError::UnknownTask(dep.task_id.clone()));
            }
            if !nodes.contains_key(dep.depends_on.as_str()) {
                return Err(ExecutorError::DependencyNotFound {
                    task_id: dep.task_id.clone(),
                    missing_dep: dep.depends_on.clone(),
                });
            }

            let prereqs = edges.entry(dep.task_id.as_str()).or_default();
            if !prereqs.contains(&dep.depends_on.as_str()) {
                prereqs.push(dep.depends_on.as_str());
                reverse_edges
                    .entry(dep.depends_on.as_str())
                    .or_default()
                    .push(dep.task_id.as_str());
            }
        }

        Ok(Self {
            nodes,
            edges,
            reverse_edges,
            insertion_order,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of tasks that list `task_id` as a direct prerequisite.
    pub fn dependents_count(&self, task_id: &str) -> usize {
        self.reverse_edges.get(task_id).map_or(0, Vec::len)
    }

    pub fn dependencies_of(&self, task_id: &str) -> &[&'a str] {
        self.edges.get(task_id).map_or(&[], Vec::as_slice)
    }

    /// Execution order: every task appears after all of its prerequisites.
    ///
    /// Depth-first post-order with three-color marking. Roots are visited in task
    /// input order and prerequisites in edge input order, so the output is stable
    /// for a given plan. Reaching an in-progress node means a cycle; resolution stops
    /// right there and no partial order is returned.
    ///
    /// # Time Complexity
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    pub fn resolve_order(&self) -> Result<Vec<&'a str>, ExecutorError> {
        let mut marks: HashMap<&str, Mark> = self
            .insertion_order
            .iter()
            .map(|id| (*id, Mark::Unvisited))
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut path = Vec::new();

        for root in &self.insertion_order {
            if marks.get(root) == Some(&Mark::Unvisited) {
                self.visit(root, &mut marks, &mut path, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        node: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
        order: &mut Vec<&'a str>,
    ) -> Result<(), ExecutorError> {
        marks.insert(node, Mark::InProgress);
        path.push(node);

        for dep in self.dependencies_of(node) {
            match marks.get(dep).copied().unwrap_or(Mark::Unvisited) {
                Mark::Done => {}
                Mark::InProgress => {
                    let start = path.iter().position(|x| x == dep).unwrap_or(0);
                    let mut cycle: Vec<&str> = path[start..].to_vec();
                    cycle.push(dep);
                    return Err(ExecutorError::CircularDependency {
                        task_id: (*dep).to_string(),
                        path: format_cycle_path(&cycle),
                    });
                }
                Mark::Unvisited => self.visit(dep, marks, path, order)?,
            }
        }

        path.pop();
        marks.insert(node, Mark::Done);
        order.push(node);
        Ok(())
    }

    /// Group tasks into layers where every task only depends on earlier layers
    /// (Kahn's algorithm).
    ///
    /// Tasks in the same layer could run concurrently. Execution is sequential
    /// today, so this is used for reporting only.
    pub fn stages(&self) -> Result<Vec<Vec<&'a str>>, ExecutorError> {
        let mut in_degree: HashMap<&str, usize> = self
            .insertion_order
            .iter()
            .map(|id| (*id, self.dependencies_of(id).len()))
            .collect();

        let mut stages: Vec<Vec<&str>> = Vec::new();
        let mut current: Vec<&str> = self
            .insertion_order
            .iter()
            .copied()
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();
        let mut processed = 0;

        while !current.is_empty() {
            processed += current.len();
            let mut next = Vec::new();

            for task_id in &current {
                if let Some(dependents) = self.reverse_edges.get(task_id) {
                    for dependent in dependents {
                        if let Some(degree) = in_degree.get_mut(dependent) {
                            *degree -= 1;
                            if *degree == 0 {
                                next.push(*dependent);
                            }
                        }
                    }
                }
            }

            // Preserve input order
            next.sort_by_key(|id| {
                self.insertion_order
                    .iter()
                    .position(|k| k == id)
                    .unwrap_or(usize::MAX)
            });

            stages.push(std::mem::replace(&mut current, next));
        }

        if processed != self.nodes.len() {
            // Surface the same error the DFS resolver would give.
            self.resolve_order()?;
        }

        Ok(stages)
    }
}

fn format_cycle_path(stack: &[&str]) -> String {
    stack.join(" -> ")
}
