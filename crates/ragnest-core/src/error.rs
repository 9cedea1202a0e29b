//! Error types for Ragnest

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    // Input errors
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    // Retrieval errors
    #[error("No content in workspace '{workspace_id}' matched the query '{query}'")]
    NoResults { workspace_id: String, query: String },

    // Workspace errors
    #[error("Failed to load workspace '{workspace_id}' from {path}: {reason}")]
    WorkspaceLoad {
        workspace_id: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Failed to persist workspace '{workspace_id}': {reason}")]
    Persistence { workspace_id: String, reason: String },

    // Embedder errors
    #[error("Embedder unavailable: {reason}. Try: {remediation}")]
    EmbedderUnavailable {
        reason: String,
        remediation: String,
    },

    // Generation errors
    #[error("Generation engine unavailable: {reason}")]
    EngineUnavailable { reason: String },

    #[error("Generation failed: {reason}")]
    Generation { reason: String },

    #[error("Deadline of {}ms exceeded during {stage}", deadline.as_millis())]
    Timeout { stage: String, deadline: Duration },

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification used by transports to pick a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or empty input, never retried
    Validation,
    /// Nothing matched; an expected outcome rather than a fault
    NotFound,
    /// A collaborator (engine, embedder) is not available
    Unavailable,
    /// The caller's deadline elapsed
    Timeout,
    /// Index, persistence, or engine failure
    Internal,
}

impl ErrorCategory {
    /// Stable machine-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Unavailable => "unavailable",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl RagError {
    /// Build a validation error for the named field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RagError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Build a generation error, keeping the collaborator's message
    pub fn generation(reason: impl Into<String>) -> Self {
        RagError::Generation { reason: reason.into() }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RagError::Validation { .. } => ErrorCategory::Validation,
            RagError::NoResults { .. } => ErrorCategory::NotFound,
            RagError::EngineUnavailable { .. } | RagError::EmbedderUnavailable { .. } => {
                ErrorCategory::Unavailable
            }
            RagError::Timeout { .. } => ErrorCategory::Timeout,
            RagError::WorkspaceLoad { .. }
            | RagError::Persistence { .. }
            | RagError::Generation { .. }
            | RagError::ConfigMissing { .. }
            | RagError::ConfigInvalid { .. }
            | RagError::Io(_)
            | RagError::Serialization(_) => ErrorCategory::Internal,
        }
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_results_is_not_found() {
        let err = RagError::NoResults {
            workspace_id: "w1".to_string(),
            query: "sky".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert!(err.to_string().contains("w1"));
    }

    #[test]
    fn test_timeout_is_distinct_from_internal() {
        let err = RagError::Timeout {
            stage: "generate".to_string(),
            deadline: Duration::from_millis(250),
        };
        assert_eq!(err.category(), ErrorCategory::Timeout);
        assert_eq!(err.to_string(), "Deadline of 250ms exceeded during generate");

        let err = RagError::generation("model crashed");
        assert_eq!(err.category(), ErrorCategory::Internal);
    }

    #[test]
    fn test_engine_unavailable_category() {
        let err = RagError::EngineUnavailable { reason: "not loaded".to_string() };
        assert_eq!(err.category(), ErrorCategory::Unavailable);
        assert_eq!(err.category().as_str(), "unavailable");
    }
}
