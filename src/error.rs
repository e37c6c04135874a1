//! Error types for trial inspection and collection lifecycle.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors that can occur while reading trials or preparing runs.
#[derive(Error, Debug)]
pub enum EvalError {
    /// An expected artifact is missing.
    #[error("Artifact not found at '{0}'")]
    NotFound(PathBuf),

    /// An artifact exists but is structurally invalid.
    #[error("Malformed data in '{path}': {reason}")]
    MalformedData { path: PathBuf, reason: String },

    /// The external vector store could not be reached or answered unexpectedly.
    #[error("Vector store error: {0}")]
    ExternalService(String),

    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A table could not be decoded as CSV.
    #[error("CSV error in '{path}': {reason}")]
    Csv { path: PathBuf, reason: String },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The requested test case is not defined.
    #[error("Test case '{name}' not found. Available cases: {}", available.join(", "))]
    UnknownTestCase {
        name: String,
        available: Vec<String>,
    },

    /// The external evaluation pipeline failed.
    #[error("Evaluation pipeline failed: {0}")]
    Pipeline(String),
}

impl EvalError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a malformed-data error with path context.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedData {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error means the artifact is simply absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EvalError::NotFound(_))
    }
}

impl From<reqwest::Error> for EvalError {
    fn from(err: reqwest::Error) -> Self {
        EvalError::ExternalService(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_test_case_lists_available() {
        let err = EvalError::UnknownTestCase {
            name: "missing".to_string(),
            available: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Test case 'missing' not found. Available cases: a, b"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(EvalError::NotFound(PathBuf::from("/x")).is_not_found());
        assert!(!EvalError::malformed("/x", "bad").is_not_found());
    }
}
