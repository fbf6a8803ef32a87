use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::observability::{MetricsSnapshot, RunMetrics};
use crate::project::Project;

/// Suffix appended to an artifact's full file name to name its sidecar.
pub const SIDECAR_SUFFIX: &str = ".metadata.json";

pub type StageParameters = Map<String, Value>;

pub fn sidecar_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

pub fn is_sidecar(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(SIDECAR_SUFFIX))
}

/// All file-system effects of a stage go through here so dry runs stay inert.
#[derive(Debug)]
pub struct ArtifactWriter {
    dry_run: bool,
    written: Vec<PathBuf>,
}

impl ArtifactWriter {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            written: Vec::new(),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn write_text(&mut self, path: &Path, content: &str) -> Result<()> {
        self.write_bytes(path, content.as_bytes())
    }

    pub fn write_bytes(&mut self, path: &Path, content: &[u8]) -> Result<()> {
        if !self.dry_run {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
            fs::write(path, content)
                .with_context(|| format!("Failed to write artifact: {}", path.display()))?;
        }
        debug!(path = %path.display(), dry_run = self.dry_run, "Artifact recorded");
        self.written.push(path.to_path_buf());
        Ok(())
    }

    pub fn write_json<T: Serialize>(&mut self, path: &Path, value: &T) -> Result<()> {
        let rendered = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize JSON for {}", path.display()))?;
        self.write_text(path, &rendered)
    }

    /// Writes `<artifact>.metadata.json` and returns its path.
    pub fn write_sidecar(&mut self, artifact: &Path, info: &Map<String, Value>) -> Result<PathBuf> {
        let path = sidecar_path(artifact);
        self.write_json(&path, info)?;
        Ok(path)
    }

    pub fn create_dir_all(&mut self, dir: &Path) -> Result<()> {
        if !self.dry_run {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn into_written(self) -> Vec<PathBuf> {
        self.written
    }
}

pub struct StageContext<'a> {
    pub project: &'a Project,
    pub project_dir: &'a Path,
}

pub trait Stage {
    fn name(&self) -> &'static str;
    fn run(&self, ctx: &StageContext<'_>, writer: &mut ArtifactWriter) -> Result<()>;
}

type StageConstructor = Arc<dyn Fn(StageParameters) -> Result<Box<dyn Stage>> + Send + Sync>;

pub struct StageRegistry {
    factories: HashMap<String, StageConstructor>,
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StageRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(StageParameters) -> Result<Box<dyn Stage>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn create(&self, name: &str, params: StageParameters) -> Result<Box<dyn Stage>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            anyhow!(
                "Unknown stage '{}'. Available stages: {}",
                name,
                self.known_stages().join(", ")
            )
        })?;
        factory(params)
    }

    pub fn known_stages(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub dry_run: bool,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub reports: Vec<StageReport>,
    pub unknown: Vec<String>,
}

pub struct StageRunner<'r> {
    registry: &'r StageRegistry,
    metrics: RunMetrics,
    dry_run: bool,
}

impl<'r> StageRunner<'r> {
    pub fn new(registry: &'r StageRegistry, dry_run: bool) -> Self {
        Self {
            registry,
            metrics: RunMetrics::default(),
            dry_run,
        }
    }

    /// Runs each named stage in order. Names without a handler are skipped
    /// with a warning and collected in the summary.
    #[instrument(skip(self, project, stages), fields(dry_run = self.dry_run))]
    pub fn run(
        &self,
        project: &Project,
        project_dir: &Path,
        stages: &[String],
    ) -> Result<RunSummary> {
        let total_start = Instant::now();
        let ctx = StageContext {
            project,
            project_dir,
        };
        let mut summary = RunSummary::default();

        for name in stages {
            if !self.registry.contains(name) {
                warn!(stage = name.as_str(), "Unknown stage, skipping");
                self.metrics.record_unknown(name);
                summary.unknown.push(name.clone());
                continue;
            }

            let span = tracing::span!(tracing::Level::DEBUG, "stage", stage = name.as_str());
            let _span_guard = span.enter();
            let started = Instant::now();

            let params = project.stage_options(name)?;
            let stage = self
                .registry
                .create(name, params)
                .with_context(|| format!("Failed to configure stage '{name}'"))?;
            let mut writer = ArtifactWriter::new(self.dry_run);
            stage
                .run(&ctx, &mut writer)
                .with_context(|| format!("Stage '{}' failed", stage.name()))?;

            let paths = writer.into_written();
            self.metrics.record_stage(name, started.elapsed(), paths.len());
            summary.reports.push(StageReport {
                stage: stage.name().to_string(),
                dry_run: self.dry_run,
                paths,
            });
        }

        self.metrics.finish(total_start.elapsed());
        Ok(summary)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
