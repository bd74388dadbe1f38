use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use cadence_core::api::{Method, Objective};

/// Seed data for an [`InMemoryStore`](super::InMemoryStore).
///
/// ```toml
/// [[methods]]
/// id = "report-v1"
/// name = "weekly report"
///
/// [[methods.approach]]
/// name = "fetch"
/// task_type = "shell"
/// heuristics = ["command: curl -sf https://example.com/data.json"]
///
/// [[objectives]]
/// id = "weekly-report"
/// method_id = "report-v1"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub methods: Vec<Method>,
    #[serde(default)]
    pub objectives: Vec<Objective>,
}

impl Catalog {
    pub fn from_toml(content: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(content).context("invalid catalog")?;
        catalog.check_references()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Every objective must point at a method of the catalog.
    fn check_references(&self) -> Result<()> {
        for objective in &self.objectives {
            if !self.methods.iter().any(|m| m.id == objective.method_id) {
                anyhow::bail!(
                    "objective '{}' references unknown method '{}'",
                    objective.id,
                    objective.method_id
                );
            }
        }
        Ok(())
    }
}
