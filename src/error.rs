//! Error types for the query-understanding pipeline.
//!
//! This module provides structured error types using thiserror. The
//! four public pipeline operations never return errors for operational
//! failures — these types surface only at construction time or from
//! explicit maintenance calls.

use thiserror::Error;

use crate::classify::ClassifyError;
use crate::embedding::EmbeddingError;

/// Main error type for pipeline construction and maintenance.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Embedding subsystem errors
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Classifier subsystem errors
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    /// General errors for cases where we need to preserve context
    #[error("{0}")]
    General(String),
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T, PipelineError>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: &str) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::General(format!("{msg}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_wraps_error() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::other("boom"));
        let wrapped = result.context("reading cache");
        let message = wrapped.unwrap_err().to_string();
        assert!(message.contains("reading cache"));
        assert!(message.contains("boom"));
    }
}
