//! Error types for DigLin feature extraction

use thiserror::Error;

/// Errors that can occur during extraction
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse exercise export: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Delimited table error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Missing required field '{field}' in exercise {exercise_id}")]
    MissingField { exercise_id: String, field: String },

    #[error("Unclassifiable action '{tag}' for template {template} in exercise {exercise_id}")]
    UnclassifiableAction {
        exercise_id: String,
        template: String,
        tag: String,
    },

    #[error("Table error: {0}")]
    TableError(String),
}

impl ComputeError {
    /// Exercise the error is attributed to, when there is one
    pub fn exercise_id(&self) -> Option<&str> {
        match self {
            ComputeError::MissingField { exercise_id, .. }
            | ComputeError::UnclassifiableAction { exercise_id, .. } => Some(exercise_id),
            _ => None,
        }
    }
}
