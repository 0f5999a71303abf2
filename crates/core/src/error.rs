//! Error types for the grounded answering workspace.
//!
//! This module defines a unified error enum that covers every failure
//! category in the workspace, plus the typed retrieval and generation
//! failures that callers branch on (degrade a signal, fall back to salvage).

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the grounded workspace.
///
/// All fallible functions return `Result<T, AppError>`.
/// Errors are represented and propagated, never panicked on.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request rejected before any retrieval ran
    #[error("Invalid input [{code}]: {message}")]
    Input {
        code: InputErrorCode,
        message: String,
    },

    /// Retrieval signal or fusion failures
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Generation collaborator failures
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Embedding collaborator failures
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Storage engine errors outside of a signal query (schema, inserts)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Prompt assembly errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build an input error with a specific code.
    pub fn input(code: InputErrorCode, message: impl Into<String>) -> Self {
        AppError::Input {
            code,
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG",
            AppError::Io(_) => "IO",
            AppError::Input { code, .. } => code.as_str(),
            AppError::Retrieval(RetrievalError::Cancelled) => "CANCELLED",
            AppError::Retrieval(_) => "RETRIEVAL_FAILURE",
            AppError::Generation(GenerationError::Timeout(_)) => "GENERATION_TIMEOUT",
            AppError::Generation(_) => "GENERATION_FAILURE",
            AppError::Embedding(_) => "EMBEDDING_FAILURE",
            AppError::Storage(_) => "STORAGE",
            AppError::Prompt(_) => "PROMPT",
            AppError::Serialization(_) => "SERIALIZATION",
            AppError::Other(_) => "OTHER",
        }
    }
}

/// Closed set of input rejection codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputErrorCode {
    EmptyQuery,
    EmptyTenant,
    EmptyDocumentScope,
    ConflictingScope,
    InvalidLimit,
}

impl InputErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "EMPTY_QUERY",
            Self::EmptyTenant => "EMPTY_TENANT",
            Self::EmptyDocumentScope => "EMPTY_DOCUMENT_SCOPE",
            Self::ConflictingScope => "CONFLICTING_SCOPE",
            Self::InvalidLimit => "INVALID_LIMIT",
        }
    }
}

impl std::fmt::Display for InputErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single retrieval signal, or of retrieval as a whole.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
    /// Storage engine unreachable or the query failed to execute
    #[error("{signal} signal unavailable: {message}")]
    Unavailable { signal: String, message: String },

    /// Storage engine returned data that cannot be interpreted
    #[error("{signal} signal returned malformed data: {message}")]
    Malformed { signal: String, message: String },

    /// Query embedding could not be produced (vector signal only)
    #[error("query embedding failed: {0}")]
    Embedding(String),

    /// Caller cancelled before fusion completed
    #[error("retrieval cancelled")]
    Cancelled,

    /// Every enabled signal failed
    #[error("all retrieval signals failed: {}", .0.join("; "))]
    AllSignalsFailed(Vec<String>),
}

/// Failure of the generation collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation quota exceeded: {0}")]
    Quota(String),

    #[error("malformed generation response: {0}")]
    Malformed(String),

    #[error("generation transport failure: {0}")]
    Transport(String),

    #[error("generation is disabled")]
    Disabled,
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_carries_specific_code() {
        let err = AppError::input(InputErrorCode::EmptyDocumentScope, "no documents selected");
        assert_eq!(err.code(), "EMPTY_DOCUMENT_SCOPE");
        assert!(err.to_string().contains("EMPTY_DOCUMENT_SCOPE"));
    }

    #[test]
    fn test_retrieval_error_codes() {
        let cancelled: AppError = RetrievalError::Cancelled.into();
        assert_eq!(cancelled.code(), "CANCELLED");

        let failed: AppError =
            RetrievalError::AllSignalsFailed(vec!["lexical".into(), "vector".into()]).into();
        assert_eq!(failed.code(), "RETRIEVAL_FAILURE");
        assert!(failed.to_string().contains("lexical; vector"));
    }

    #[test]
    fn test_generation_timeout_code() {
        let err: AppError = GenerationError::Timeout(Duration::from_secs(3)).into();
        assert_eq!(err.code(), "GENERATION_TIMEOUT");
    }
}
