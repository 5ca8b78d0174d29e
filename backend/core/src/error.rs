use thiserror::Error;

/// Top-level error type for the hark dispatcher.
///
/// Only construction-time violations surface to callers during steady-state
/// operation; everything else is logged at the boundary where it happens.
#[derive(Debug, Error)]
pub enum HarkError {
    #[error("command '{name}' was built without an action")]
    MissingAction { name: String },

    #[error("invalid action template: {0}")]
    InvalidTemplate(String),

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
