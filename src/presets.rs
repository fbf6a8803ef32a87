use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StarterOptions {
    pub title: String,
    pub genre: String,
    pub format: String,
}

impl Default for StarterOptions {
    fn default() -> Self {
        Self {
            title: "Untitled Project".into(),
            genre: "Drama".into(),
            format: "short".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct StarterProject {
    title: String,
    genre: String,
    format: String,
    pipeline_stages: Vec<&'static str>,
    script_dev: ScriptDevOptions,
}

#[derive(Debug, Clone, Serialize)]
struct ScriptDevOptions {
    model: &'static str,
    deterministic_seed: u64,
}

/// Writes a starter project file listing every built-in stage.
pub fn generate_project(options: &StarterOptions, destination: &Path, force: bool) -> Result<PathBuf> {
    if destination.exists() && !force {
        bail!(
            "Refusing to overwrite existing project file: {} (pass --force)",
            destination.display()
        );
    }

    let starter = StarterProject {
        title: options.title.clone(),
        genre: options.genre.clone(),
        format: options.format.clone(),
        pipeline_stages: vec!["script_dev", "previs", "visuals", "audio", "assemble"],
        script_dev: ScriptDevOptions {
            model: "<placeholder>",
            deterministic_seed: 42,
        },
    };

    let rendered = serde_yaml::to_string(&starter)?;
    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(destination, rendered)
        .with_context(|| format!("Failed to write project file: {}", destination.display()))?;

    Ok(destination.to_path_buf())
}
