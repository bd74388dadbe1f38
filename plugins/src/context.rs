use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use cadence_core::api::{ContextLoader, ExecutionTask, ResolvedContext};

/// Key under which task parameters are exposed
pub const PARAMS_KEY: &str = "params";

/// Resolves input references by scheme.
///
/// - `env:NAME` reads an environment variable
/// - `file:PATH` reads a file (relative paths resolve against the base directory);
///   JSON content is parsed, anything else is kept as a string
/// - `inline:TEXT` is taken literally
///
/// References without a known scheme pass through as strings. Every value is keyed
/// by its full reference.
#[derive(Debug, Clone, Default)]
pub struct ReferenceContextLoader {
    base_dir: Option<PathBuf>,
}

impl ReferenceContextLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn resolve_path(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    async fn resolve(&self, reference: &str) -> Result<Value> {
        if let Some(name) = reference.strip_prefix("env:") {
            let value = std::env::var(name)
                .with_context(|| format!("environment variable '{name}' is not set"))?;
            return Ok(Value::String(value));
        }
        if let Some(raw) = reference.strip_prefix("file:") {
            let path = self.resolve_path(raw);
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            return Ok(serde_json::from_str(&content).unwrap_or(Value::String(content)));
        }
        if let Some(text) = reference.strip_prefix("inline:") {
            return Ok(Value::String(text.to_string()));
        }
        Ok(Value::String(reference.to_string()))
    }
}

#[async_trait]
impl ContextLoader for ReferenceContextLoader {
    async fn load_task_context(&self, task: &ExecutionTask) -> Result<ResolvedContext> {
        let mut context = ResolvedContext::new();
        for reference in &task.context.input_refs {
            let value = self
                .resolve(reference)
                .await
                .with_context(|| format!("input '{reference}'"))?;
            context.insert(reference.clone(), value);
        }
        if !task.context.parameters.is_empty() {
            let params = serde_json::to_value(&task.context.parameters)?;
            context.insert(PARAMS_KEY.to_string(), params);
        }
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_inline_file_and_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.json"), r#"{"rows": 3}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "plain text").unwrap();

        let task = ExecutionTask::new("t", "x")
            .with_input_ref("inline:hello")
            .with_input_ref("file:data.json")
            .with_input_ref("file:notes.txt")
            .with_input_ref("step-1.output")
            .with_parameter("command", "echo");
        let loader = ReferenceContextLoader::new().with_base_dir(dir.path());
        let ctx = loader.load_task_context(&task).await.unwrap();

        assert_eq!(ctx["inline:hello"], "hello");
        assert_eq!(ctx["file:data.json"]["rows"], 3);
        assert_eq!(ctx["file:notes.txt"], "plain text");
        assert_eq!(ctx["step-1.output"], "step-1.output");
        assert_eq!(ctx[PARAMS_KEY]["command"], "echo");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let task = ExecutionTask::new("t", "x").with_input_ref("file:/definitely/not/here");
        let err = ReferenceContextLoader::new()
            .load_task_context(&task)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to read"));
    }

    #[tokio::test]
    async fn missing_env_var_is_an_error() {
        let task = ExecutionTask::new("t", "x").with_input_ref("env:CADENCE_TEST_UNSET_VARIABLE");
        let err = ReferenceContextLoader::new()
            .load_task_context(&task)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("CADENCE_TEST_UNSET_VARIABLE"));
    }
}
