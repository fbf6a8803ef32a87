use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::pipeline::StageParameters;

/// A project file as read from disk, before any schema checks.
#[derive(Debug, Clone)]
pub struct ProjectDocument {
    pub path: PathBuf,
    pub value: Value,
}

impl ProjectDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read project file: {}", path.display()))?;
        let value: Value = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse project YAML: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            value,
        })
    }

    /// Directory that stage artifacts are written under.
    pub fn project_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn project(&self) -> Result<Project> {
        serde_json::from_value(self.value.clone())
            .with_context(|| format!("Project file has unexpected shape: {}", self.path.display()))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Project {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub pipeline_stages: Vec<String>,
    /// Per-stage option mappings and any other top-level keys.
    #[serde(flatten)]
    pub sections: Map<String, Value>,
}

impl Project {
    /// Options declared under the stage's own key. Absent or null means none.
    pub fn stage_options(&self, stage: &str) -> Result<StageParameters> {
        match self.sections.get(stage) {
            None | Some(Value::Null) => Ok(StageParameters::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(other) => bail!(
                "Options for stage '{}' must be a mapping, found {}",
                stage,
                other
            ),
        }
    }

    /// Expands the requested stage names; `full` or nothing selects `pipeline_stages`.
    /// A `full` entry inside `pipeline_stages` itself is dropped.
    pub fn resolve_stages(&self, requested: &[String]) -> Vec<String> {
        if requested.is_empty() || requested.iter().any(|name| name == "full") {
            self.pipeline_stages
                .iter()
                .filter(|name| name.as_str() != "full")
                .cloned()
                .collect()
        } else {
            requested.to_vec()
        }
    }
}
