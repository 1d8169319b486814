//! Error types for memweave-core.

use thiserror::Error;

/// Result type alias using memweave-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during memory synthesis operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Completion API error with provider context
    #[error("Completion API error: {provider} - {message}")]
    CompletionApi { provider: String, message: String },

    /// Completion error (simple variant)
    #[error("Completion error: {0}")]
    Completion(String),

    /// Memory storage error
    #[error("Memory storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed analysis payload
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a completion API error.
    pub fn completion_api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CompletionApi {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
