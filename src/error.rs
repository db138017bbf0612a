//! Error types shared by the whole engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NetworkError>;

/// Errors that can occur while building, running, training or persisting a network.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Dataset is empty")]
    DatasetEmpty,

    #[error("Malformed dataset record on line {line}: {message}")]
    DatasetFormat { line: usize, message: String },

    #[error("Malformed network data: {0}")]
    PersistenceFormat(String),

    #[error("Invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Config(#[from] serde_json::Error),
}

impl NetworkError {
    pub(crate) fn shape(
        context: &'static str,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        NetworkError::ShapeMismatch {
            context,
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }
}
