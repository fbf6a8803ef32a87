pub mod error;
pub mod observability;
pub mod pipeline;
pub mod presets;
pub mod project;
pub mod stages;
pub mod validation;

pub use error::StudioError;
pub use pipeline::{StageRegistry, StageRunner};
pub use project::{Project, ProjectDocument};
pub use validation::{ProjectSchema, ValidationReport};
