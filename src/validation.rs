use std::fmt;
use std::path::{Path, PathBuf};

use jsonschema::{Draft, JSONSchema};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::StudioError;
use crate::pipeline::StageRegistry;

pub const SCHEMA_ENV: &str = "MOVIE_STUDIO_SCHEMA";
pub const DEFAULT_SCHEMA: &str = "templates/project_schema.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Dotted instance path; empty for the document root.
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() {
            "(root)"
        } else {
            &self.path
        };
        write!(f, "{}: {}", path, self.message)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

pub struct ProjectSchema {
    compiled: JSONSchema,
}

impl ProjectSchema {
    pub fn load(path: &Path) -> Result<Self, StudioError> {
        if !path.is_file() {
            return Err(StudioError::SchemaNotFound(path.to_path_buf()));
        }
        let invalid = |message: String| StudioError::InvalidSchema {
            path: path.to_path_buf(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|err| invalid(err.to_string()))?;
        let value: Value = serde_yaml::from_str(&content).map_err(|err| invalid(err.to_string()))?;
        Self::compile(&value).map_err(invalid)
    }

    pub fn from_value(value: &Value) -> Result<Self, StudioError> {
        Self::compile(value).map_err(|message| StudioError::InvalidSchema {
            path: PathBuf::from("<inline>"),
            message,
        })
    }

    fn compile(value: &Value) -> Result<Self, String> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(value)
            .map_err(|err| err.to_string())?;
        Ok(Self { compiled })
    }

    /// Applies the schema and returns its violations ordered by field path.
    pub fn validate(&self, document: &Value) -> ValidationReport {
        let mut issues: Vec<(Vec<PathSegment>, ValidationIssue)> =
            match self.compiled.validate(document) {
                Ok(()) => Vec::new(),
                Err(errors) => errors
                    .map(|err| {
                        let segments = pointer_segments(&err.instance_path.to_string());
                        let path = segments
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(".");
                        let issue = ValidationIssue {
                            path,
                            message: err.to_string(),
                        };
                        (segments, issue)
                    })
                    .collect(),
            };
        issues.sort_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs));
        debug!(issues = issues.len(), "Schema applied");

        ValidationReport {
            errors: issues.into_iter().map(|(_, issue)| issue).collect(),
            warnings: Vec::new(),
        }
    }
}

/// Schema check plus a warning for each declared stage nothing can run.
pub fn validate_project(
    schema: &ProjectSchema,
    document: &Value,
    registry: &StageRegistry,
) -> ValidationReport {
    let mut report = schema.validate(document);

    if let Some(stages) = document.get("pipeline_stages").and_then(Value::as_array) {
        let mut unknown = ValidationReport::default();
        for (idx, name) in stages.iter().filter_map(Value::as_str).enumerate() {
            if name != "full" && !registry.contains(name) {
                unknown.warnings.push(format!(
                    "Pipeline stage {} ('{}') has no handler and will be skipped. Available stages: {}",
                    idx + 1,
                    name,
                    registry.known_stages().join(", ")
                ));
            }
        }
        report.merge(unknown);
    }

    report
}

/// Finds the schema file: explicit path first, then `templates/` next to the
/// project or any of its ancestors, then the current directory.
pub fn locate_schema(explicit: Option<&Path>, project_path: &Path) -> Result<PathBuf, StudioError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(StudioError::SchemaNotFound(path.to_path_buf()))
        };
    }

    let start = project_path
        .canonicalize()
        .unwrap_or_else(|_| project_path.to_path_buf());
    for dir in start.ancestors().skip(1) {
        let candidate = dir.join(DEFAULT_SCHEMA);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    let fallback = PathBuf::from(DEFAULT_SCHEMA);
    if fallback.is_file() {
        Ok(fallback)
    } else {
        Err(StudioError::SchemaNotFound(fallback))
    }
}

/// One step of an instance path. Array indices order numerically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum PathSegment {
    Index(usize),
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(idx) => write!(f, "{idx}"),
            Self::Key(key) => f.write_str(key),
        }
    }
}

fn pointer_segments(pointer: &str) -> Vec<PathSegment> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| match segment.parse::<usize>() {
            Ok(idx) => PathSegment::Index(idx),
            Err(_) => PathSegment::Key(segment.replace("~1", "/").replace("~0", "~")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ProjectSchema {
        ProjectSchema::from_value(&json!({
            "type": "object",
            "required": ["title", "pipeline_stages"],
            "properties": {
                "title": {"type": "string"},
                "pipeline_stages": {"type": "array", "items": {"type": "string"}},
                "script_dev": {"$ref": "#/definitions/script_dev"}
            },
            "definitions": {
                "script_dev": {
                    "type": "object",
                    "properties": {"deterministic_seed": {"type": "integer"}}
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn issues_are_ordered_by_path() {
        let report = schema().validate(&json!({
            "title": 7,
            "pipeline_stages": ["a", 2],
            "script_dev": {"deterministic_seed": "x"}
        }));
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["pipeline_stages.1", "script_dev.deterministic_seed", "title"]
        );
    }

    #[test]
    fn root_issues_sort_first() {
        let report = schema().validate(&json!({"title": 1}));
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].path, "");
        assert!(report.errors[0].to_string().starts_with("(root): "));
        assert_eq!(report.errors[1].path, "title");
    }

    #[test]
    fn unusable_schema_is_rejected() {
        let err = ProjectSchema::from_value(&json!({"type": 12})).err().unwrap();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn pointer_segments_unescape() {
        assert_eq!(pointer_segments(""), Vec::<PathSegment>::new());
        assert_eq!(
            pointer_segments("/a~1b/0"),
            vec![PathSegment::Key("a/b".into()), PathSegment::Index(0)]
        );
    }

    #[test]
    fn array_indices_sort_numerically() {
        let mut stages: Vec<Value> = (0..11).map(|i| json!(format!("stage_{i}"))).collect();
        stages[2] = json!(2);
        stages[10] = json!(10);
        let report = schema().validate(&json!({"title": "t", "pipeline_stages": stages}));
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["pipeline_stages.2", "pipeline_stages.10"]);
    }
}
