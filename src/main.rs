use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueHint};
use movie_studio::error::{StudioError, exit_code_for};
use movie_studio::observability::{MetricsSnapshot, log_snapshot};
use movie_studio::pipeline::{StageRegistry, StageRunner};
use movie_studio::presets::{StarterOptions, generate_project};
use movie_studio::project::ProjectDocument;
use movie_studio::stages;
use movie_studio::validation::{
    ProjectSchema, SCHEMA_ENV, ValidationReport, locate_schema, validate_project,
};
use serde_json::to_writer_pretty;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = configure_tracing() {
        eprintln!("warning: failed to initialise logging: {err}");
    }

    let result = match cli.command {
        Commands::Validate { project, schema } => validate_cmd(&project, schema.as_deref()),
        Commands::Run {
            project,
            stages,
            dry_run,
            schema,
            print_metrics,
            metrics_json,
        } => run_cmd(
            &project,
            &stages,
            dry_run,
            schema.as_deref(),
            print_metrics,
            metrics_json,
        ),
        Commands::ListStages => {
            list_stages();
            Ok(())
        }
        Commands::Init {
            output,
            title,
            genre,
            format,
            force,
        } => init_cmd(
            &output,
            StarterOptions {
                title,
                genre,
                format,
            },
            force,
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn configure_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|err| anyhow!(err.to_string()))
}

/// Loads the project and schema and applies the schema. Fails only when the
/// project or schema cannot be read.
fn check_project(
    project_path: &Path,
    schema_path: Option<&Path>,
    registry: &StageRegistry,
) -> Result<(ProjectDocument, ValidationReport)> {
    let document = ProjectDocument::load(project_path)?;
    let schema_path = locate_schema(schema_path, project_path)?;
    info!(schema = %schema_path.display(), "Using project schema");
    let schema = ProjectSchema::load(&schema_path)?;
    let report = validate_project(&schema, &document.value, registry);

    for warning in &report.warnings {
        warn!(file = %project_path.display(), "{warning}");
    }
    Ok((document, report))
}

fn print_issues(report: &ValidationReport) {
    for issue in &report.errors {
        eprintln!("- {issue}");
    }
}

fn validate_cmd(project_path: &Path, schema_path: Option<&Path>) -> Result<()> {
    let registry = stages::default_registry();
    let (_, report) = check_project(project_path, schema_path, &registry)?;

    if report.is_ok() {
        info!(file = %project_path.display(), "Project validation passed");
        println!("Validation passed");
        Ok(())
    } else {
        eprintln!("Validation failed:");
        print_issues(&report);
        Err(StudioError::ValidationFailed(report.errors.len()).into())
    }
}

fn run_cmd(
    project_path: &Path,
    requested: &[String],
    dry_run: bool,
    schema_path: Option<&Path>,
    print_metrics: bool,
    metrics_json: Option<PathBuf>,
) -> Result<()> {
    let registry = stages::default_registry();
    let (document, report) = check_project(project_path, schema_path, &registry)?;
    if !report.is_ok() {
        eprintln!("Project validation failed. Run `validate` for details.");
        print_issues(&report);
        return Err(StudioError::ValidationFailed(report.errors.len()).into());
    }

    let project = document.project()?;
    let project_dir = document.project_dir();
    let stage_names = project.resolve_stages(requested);
    info!(stages = ?stage_names, dry_run, "Running stages");

    let runner = StageRunner::new(&registry, dry_run);
    let summary = runner.run(&project, &project_dir, &stage_names)?;

    for stage_report in &summary.reports {
        println!("--- {} ---", stage_report.stage);
        for path in &stage_report.paths {
            if stage_report.dry_run {
                println!("[dry-run] would write {}", path.display());
            } else {
                println!("Wrote {}", path.display());
            }
        }
    }

    if print_metrics || metrics_json.is_some() {
        let snapshot = runner.metrics();
        if print_metrics {
            log_snapshot(&snapshot);
        }
        if let Some(path) = metrics_json {
            write_metrics_json(&path, &snapshot, dry_run)?;
        }
    }

    if summary.unknown.is_empty() {
        Ok(())
    } else {
        Err(StudioError::UnknownStages(summary.unknown).into())
    }
}

fn write_metrics_json(path: &Path, snapshot: &MetricsSnapshot, dry_run: bool) -> Result<()> {
    if dry_run {
        warn!(metrics = %path.display(), "Dry run; not writing metrics JSON");
        return Ok(());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create metrics directory: {}", parent.display())
        })?;
    }
    let file = File::create(path)
        .with_context(|| format!("Failed to create metrics file: {}", path.display()))?;
    to_writer_pretty(file, snapshot)
        .with_context(|| format!("Failed to write metrics JSON: {}", path.display()))?;
    info!(metrics = %path.display(), "Metrics JSON written");
    Ok(())
}

fn list_stages() {
    let registry = stages::default_registry();
    println!("Available stages:");
    for name in registry.known_stages() {
        println!("- {name}");
    }
}

fn init_cmd(output: &Path, options: StarterOptions, force: bool) -> Result<()> {
    let generated = generate_project(&options, output, force)?;
    info!(
        title = %options.title,
        path = %generated.display(),
        "Starter project generated"
    );
    Ok(())
}

#[derive(Parser)]
#[command(
    name = "movie-studio",
    version,
    about = "Validate movie projects and emit placeholder pipeline artifacts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a project file against the project schema.
    Validate {
        #[arg(long, value_hint = ValueHint::FilePath)]
        project: PathBuf,
        #[arg(long, env = SCHEMA_ENV, value_hint = ValueHint::FilePath)]
        schema: Option<PathBuf>,
    },
    /// Run pipeline stages, writing placeholder artifacts next to the project file.
    Run {
        #[arg(long, value_hint = ValueHint::FilePath)]
        project: PathBuf,
        /// Stage to run; repeatable. `full` runs the project's pipeline_stages.
        #[arg(long = "stage")]
        stages: Vec<String>,
        /// Print intended writes without touching the file system.
        #[arg(long)]
        dry_run: bool,
        #[arg(long, env = SCHEMA_ENV, value_hint = ValueHint::FilePath)]
        schema: Option<PathBuf>,
        #[arg(long)]
        print_metrics: bool,
        #[arg(long = "metrics-json")]
        metrics_json: Option<PathBuf>,
    },
    ListStages,
    /// Write a starter project file.
    Init {
        #[arg(long, value_hint = ValueHint::FilePath)]
        output: PathBuf,
        #[arg(long, default_value = "Untitled Project")]
        title: String,
        #[arg(long, default_value = "Drama")]
        genre: String,
        #[arg(long, default_value = "short")]
        format: String,
        #[arg(long)]
        force: bool,
    },
}
