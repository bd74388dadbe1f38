use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::executor::types::ExecutionResult;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MethodDomain {
    #[default]
    General,
    DomainSpecific { tag: String },
    UserSpecific { user_id: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodStatus {
    #[default]
    Active,
    Deprecated,
    Superseded,
}

/// One step of a method's approach
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApproachStep {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Task type for tasks planned from this step; the step name when empty
    #[serde(default)]
    pub task_type: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub heuristics: Vec<String>,
    /// When the step applies
    #[serde(default)]
    pub conditions: Vec<String>,
    /// Names of earlier steps this one needs; empty means "the previous step"
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl ApproachStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = task_type.into();
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tools.push(tool.into());
        self
    }

    pub fn with_heuristic(mut self, heuristic: impl Into<String>) -> Self {
        self.heuristics.push(heuristic.into());
        self
    }

    pub fn effective_task_type(&self) -> &str {
        if self.task_type.trim().is_empty() {
            &self.name
        } else {
            &self.task_type
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuccessMetrics {
    #[serde(default)]
    pub execution_count: u32,
    #[serde(default)]
    pub success_count: u32,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    /// Running average of plan quality ratings
    #[serde(default)]
    pub avg_rating: f64,
}

impl SuccessMetrics {
    /// Success rate in percent; 0.0 before the first execution.
    pub fn success_rate(&self) -> f64 {
        if self.execution_count == 0 {
            return 0.0;
        }
        f64::from(self.success_count) / f64::from(self.execution_count) * 100.0
    }

    /// Metrics after one more execution. `avg += (rating - avg) / count`.
    pub fn recorded(&self, success: bool, rating: f64, at: DateTime<Utc>) -> Self {
        let execution_count = self.execution_count.saturating_add(1);
        Self {
            execution_count,
            success_count: self.success_count + u32::from(success),
            last_used: Some(at),
            avg_rating: self.avg_rating + (rating - self.avg_rating) / f64::from(execution_count),
        }
    }
}

/// Versioned, reusable recipe for achieving objectives of a kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub approach: Vec<ApproachStep>,
    #[serde(default)]
    pub domain: MethodDomain,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub status: MethodStatus,
    #[serde(default)]
    pub metrics: SuccessMetrics,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl Method {
    pub fn new(id: impl Into<String>, name: impl Into<String>, approach: Vec<ApproachStep>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            approach,
            domain: MethodDomain::General,
            version: default_version(),
            status: MethodStatus::Active,
            metrics: SuccessMetrics::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MethodStatus::Active
    }

    /// Steps plus every tool and heuristic reference
    pub fn complexity(&self) -> usize {
        self.approach
            .iter()
            .map(|step| 1 + step.tools.len() + step.heuristics.len())
            .sum()
    }
}

/// Concrete goal instance, achieved through a method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub method_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Objective {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        method_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            method_id: method_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Partial update of a [`Method`]. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approach: Option<Vec<ApproachStep>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MethodStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<SuccessMetrics>,
}

impl MethodPatch {
    pub fn status(status: MethodStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn metrics(metrics: SuccessMetrics) -> Self {
        Self {
            metrics: Some(metrics),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.approach.is_none()
            && self.status.is_none()
            && self.metrics.is_none()
    }

    /// New method value with the patch applied; `method` itself is not touched.
    pub fn apply(&self, method: &Method) -> Method {
        let mut next = method.clone();
        if let Some(name) = &self.name {
            next.name = name.clone();
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        if let Some(approach) = &self.approach {
            next.approach = approach.clone();
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(metrics) = &self.metrics {
            next.metrics = metrics.clone();
        }
        next.updated_at = Utc::now();
        next
    }
}

/// Assessment of one execution, and the final outcome of a learning call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningOutcome {
    Success,
    PartialSuccess,
    MethodFailure,
    EnvironmentFailure,
    InsufficientData,
}

impl LearningOutcome {
    /// The method is not to blame for these; refinement is never attempted.
    pub fn forbids_refinement(self) -> bool {
        matches!(
            self,
            Self::Success | Self::EnvironmentFailure | Self::InsufficientData
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionAnalysis {
    pub assessment: LearningOutcome,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

impl ExecutionAnalysis {
    pub fn new(assessment: LearningOutcome) -> Self {
        Self {
            assessment,
            insights: Vec::new(),
            recommendations: Vec::new(),
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementKind {
    None,
    Modify,
    Replace,
    Retire,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRefinement {
    pub kind: RefinementKind,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub changes: MethodPatch,
}

impl MethodRefinement {
    pub fn none(rationale: impl Into<String>) -> Self {
        Self {
            kind: RefinementKind::None,
            rationale: rationale.into(),
            changes: MethodPatch::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Apply,
    Reject,
    Defer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementEvaluation {
    pub recommendation: Recommendation,
    #[serde(default)]
    pub expected_success_gain: f64,
    /// Positive when the refined method is simpler than the current one
    #[serde(default)]
    pub complexity_reduction: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// One plan-and-execute round of a learning call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub attempt: u32,
    pub plan_id: String,
    pub method_id: String,
    pub execution: ExecutionResult,
    #[serde(default)]
    pub analysis: Option<ExecutionAnalysis>,
    pub refinement_applied: bool,
    #[serde(default)]
    pub refinement_kind: Option<RefinementKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningResult {
    pub objective_id: String,
    pub attempts: Vec<AttemptResult>,
    pub outcome: LearningOutcome,
    /// Method in effect when the call ended; empty if it was never loaded
    pub final_method_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl LearningResult {
    pub fn new(objective_id: impl Into<String>) -> Self {
        Self {
            objective_id: objective_id.into(),
            attempts: Vec::new(),
            outcome: LearningOutcome::InsufficientData,
            final_method_id: String::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn finish(&mut self, outcome: LearningOutcome) {
        self.outcome = outcome;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_average_rating() {
        let now = Utc::now();
        let m = SuccessMetrics::default()
            .recorded(true, 8.0, now)
            .recorded(false, 2.0, now)
            .recorded(true, 5.0, now);
        assert_eq!(m.execution_count, 3);
        assert_eq!(m.success_count, 2);
        assert!((m.avg_rating - 5.0).abs() < 1e-9);
        assert!((m.success_rate() - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(m.last_used, Some(now));
    }

    #[test]
    fn success_rate_is_zero_before_any_run() {
        assert_eq!(SuccessMetrics::default().success_rate(), 0.0);
    }

    #[test]
    fn patch_returns_new_value() {
        let method = Method::new("m1", "fetch-and-parse", vec![ApproachStep::new("fetch")]);
        let patch = MethodPatch {
            name: Some("renamed".into()),
            status: Some(MethodStatus::Superseded),
            ..Default::default()
        };

        let next = patch.apply(&method);
        assert_eq!(next.name, "renamed");
        assert_eq!(next.status, MethodStatus::Superseded);
        assert_eq!(next.approach, method.approach);
        assert_eq!(method.name, "fetch-and-parse");
        assert!(method.is_active());
        assert!(MethodPatch::default().is_empty());
    }

    #[test]
    fn complexity_counts_steps_tools_heuristics() {
        let method = Method::new(
            "m",
            "n",
            vec![
                ApproachStep::new("a").with_tool("curl").with_heuristic("retry"),
                ApproachStep::new("b").with_tool("jq"),
            ],
        );
        assert_eq!(method.complexity(), 5);
    }

    #[test]
    fn refinement_forbidden_for_non_method_outcomes() {
        assert!(LearningOutcome::Success.forbids_refinement());
        assert!(LearningOutcome::EnvironmentFailure.forbids_refinement());
        assert!(LearningOutcome::InsufficientData.forbids_refinement());
        assert!(!LearningOutcome::MethodFailure.forbids_refinement());
        assert!(!LearningOutcome::PartialSuccess.forbids_refinement());
    }

    #[test]
    fn method_domain_serializes_tagged() {
        let json = serde_json::to_value(MethodDomain::DomainSpecific { tag: "etl".into() }).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "domain_specific", "tag": "etl" }));
    }
}
