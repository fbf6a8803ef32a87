use std::fs;
use std::path::Path;

use movie_studio::error::StudioError;
use movie_studio::project::ProjectDocument;
use movie_studio::stages;
use movie_studio::validation::{ProjectSchema, locate_schema, validate_project};
use serde_json::json;
use tempfile::tempdir;

fn schema() -> ProjectSchema {
    ProjectSchema::load(Path::new("templates/project_schema.yaml")).expect("schema should load")
}

#[test]
fn demo_project_is_valid() {
    let document = ProjectDocument::load(Path::new("demos/slavic_horror_short/project.yaml"))
        .expect("demo project should load");
    let report = validate_project(&schema(), &document.value, &stages::default_registry());
    assert!(
        report.is_ok(),
        "demo project should pass validation: {:?}",
        report.errors
    );
    assert!(report.warnings.is_empty());
}

#[test]
fn missing_required_fields_are_reported() {
    let report = schema().validate(&json!({"title": "Bad Project"}));
    assert!(!report.is_ok());
    let messages: Vec<_> = report.errors.iter().map(|e| e.message.as_str()).collect();
    assert!(messages.iter().any(|m| m.contains("pipeline_stages")));
    assert!(messages.iter().any(|m| m.contains("genre")));
}

#[test]
fn nested_errors_carry_field_path() {
    let report = schema().validate(&json!({
        "title": "Test",
        "genre": "Slavic Horror",
        "format": "short",
        "pipeline_stages": ["script_dev"],
        "script_dev": {"model": "m", "deterministic_seed": "seven"}
    }));
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].path, "script_dev.deterministic_seed");
}

#[test]
fn unknown_pipeline_stage_is_a_warning() {
    let document = json!({
        "title": "Test",
        "genre": "Slavic Horror",
        "format": "short",
        "pipeline_stages": ["script_dev", "color_grade"]
    });
    let report = validate_project(&schema(), &document, &stages::default_registry());
    assert!(report.is_ok());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("color_grade"));
}

#[test]
fn missing_schema_maps_to_exit_code_two() {
    let temp = tempdir().unwrap();
    let missing = temp.path().join("nope.yaml");
    let err = ProjectSchema::load(&missing).err().unwrap();
    assert!(matches!(err, StudioError::SchemaNotFound(_)));
    assert_eq!(err.exit_code(), 2);

    let err = locate_schema(Some(&missing), Path::new("project.yaml")).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn schema_is_found_next_to_project_ancestors() {
    let temp = tempdir().unwrap();
    let templates = temp.path().join("templates");
    fs::create_dir_all(&templates).unwrap();
    fs::copy("templates/project_schema.yaml", templates.join("project_schema.yaml")).unwrap();
    let project_dir = temp.path().join("films/short");
    fs::create_dir_all(&project_dir).unwrap();
    let project = project_dir.join("project.yaml");
    fs::write(&project, "title: x\n").unwrap();

    let found = locate_schema(None, &project).unwrap();
    assert!(found.ends_with("templates/project_schema.yaml"));
    assert!(found.starts_with(temp.path().canonicalize().unwrap()));
}
