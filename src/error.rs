use std::path::PathBuf;

use thiserror::Error;

/// Failures that carry a specific process exit status.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Schema not found: {}", .0.display())]
    SchemaNotFound(PathBuf),
    #[error("Schema {} is not a usable JSON schema: {message}", .path.display())]
    InvalidSchema { path: PathBuf, message: String },
    #[error("Project validation failed with {0} error(s)")]
    ValidationFailed(usize),
    #[error("Unknown stage(s) requested: {}", .0.join(", "))]
    UnknownStages(Vec<String>),
}

impl StudioError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::SchemaNotFound(_) | Self::InvalidSchema { .. } => 2,
            Self::ValidationFailed(_) | Self::UnknownStages(_) => 1,
        }
    }
}

/// Exit status for any error bubbling out of a command.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StudioError>())
        .map(StudioError::exit_code)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn schema_errors_exit_with_two() {
        let err = anyhow::Error::new(StudioError::SchemaNotFound("x.yaml".into()));
        assert_eq!(exit_code_for(&err), 2);
    }

    #[test]
    fn wrapped_errors_keep_their_code() {
        let result: Result<(), StudioError> = Err(StudioError::ValidationFailed(3));
        let err = result.context("while validating").unwrap_err();
        assert_eq!(exit_code_for(&err), 1);
        assert_eq!(exit_code_for(&anyhow::anyhow!("plain")), 1);
    }
}
