//! Error types for RailYard

use thiserror::Error;

/// Result type for RailYard operations
pub type Result<T> = std::result::Result<T, RailyardError>;

/// Library-level errors.
///
/// Schema problems are not errors in this sense: the validator reports them
/// as a list of messages and never fails.
#[derive(Error, Debug)]
pub enum RailyardError {
    #[error("Schema failed validation with {} error(s)", .0.len())]
    Validation(Vec<String>),

    #[error("Editor error: {0}")]
    Editor(#[from] EditorError),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rejections raised by the interactive editor before it touches the store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Cannot create association to the same model")]
    SelfAssociation,

    #[error("Association already exists between these models")]
    DuplicateAssociation,
}
