use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use glob::{MatchOptions, Pattern, glob_with};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::pipeline::{ArtifactWriter, Stage, StageContext, is_sidecar};

pub const MANIFEST_FILE: &str = "assemble_manifest.json";

#[derive(Debug, Serialize)]
struct AssembleManifest {
    title: Option<String>,
    generated_at: DateTime<Utc>,
    artifacts: Vec<String>,
    digests: BTreeMap<String, String>,
}

pub(super) struct AssembleStage;

impl Stage for AssembleStage {
    fn name(&self) -> &'static str {
        "assemble"
    }

    fn run(&self, ctx: &StageContext<'_>, writer: &mut ArtifactWriter) -> Result<()> {
        let manifest_path = ctx.project_dir.join(MANIFEST_FILE);
        if writer.is_dry_run() {
            // The writer only records the path here; skip scanning and hashing.
            return writer.write_text(&manifest_path, "");
        }

        let files = collect_artifacts(ctx.project_dir)?;
        let mut digests = BTreeMap::new();
        for file in &files {
            digests.insert(file.to_string_lossy().to_string(), sha256_file(file)?);
        }
        debug!(count = files.len(), "Collected artifacts for manifest");

        let manifest = AssembleManifest {
            title: ctx.project.title.clone(),
            generated_at: Utc::now(),
            artifacts: files
                .iter()
                .map(|path| path.to_string_lossy().to_string())
                .collect(),
            digests,
        };
        writer.write_json(&manifest_path, &manifest)
    }
}

/// Every regular file below `dir`, sorted, without sidecars or a previous manifest.
pub fn collect_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/**/*",
        Pattern::escape(&dir.to_string_lossy()).trim_end_matches('/')
    );
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let mut files = Vec::new();
    for entry in glob_with(&pattern, options)
        .with_context(|| format!("Invalid artifact pattern: {pattern}"))?
    {
        let path = entry.with_context(|| format!("Failed to scan {}", dir.display()))?;
        if path.is_file() && !is_sidecar(&path) && !is_manifest(&path, dir) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// True for `<dir>/assemble_manifest.json`, however `.` components are spelled.
fn is_manifest(path: &Path, dir: &Path) -> bool {
    path.file_name().is_some_and(|name| name == MANIFEST_FILE)
        && path.parent().map(without_cur_dir) == Some(without_cur_dir(dir))
}

fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open artifact for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
