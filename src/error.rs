//! Error types for IssueChat
//!
//! Crate-level error enum covering configuration, persistence and the
//! lower-level transport/sync failures. Uses thiserror for ergonomic error handling.

use crate::sync::SyncError;
use crate::transport::TransportError;
use thiserror::Error;

/// Result type alias for IssueChat operations
pub type Result<T> = std::result::Result<T, IssueChatError>;

/// Comprehensive error type for IssueChat operations
#[derive(Error, Debug)]
pub enum IssueChatError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Errors reported by the issue transport
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Errors from the sync engine
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl IssueChatError {
    /// Whether this error wraps a `SyncError::Busy` (a soft no-op, not a failure)
    pub fn is_busy(&self) -> bool {
        matches!(self, IssueChatError::Sync(SyncError::Busy))
    }
}
