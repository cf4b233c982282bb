//! Error types for operation tracking.

use thiserror::Error;

/// Result type alias for operation tracking.
pub type Result<T> = std::result::Result<T, OperationError>;

/// Errors that can occur while submitting or polling operations.
#[derive(Error, Debug)]
pub enum OperationError {
    /// Provider not configured.
    #[error("completion provider not configured")]
    ProviderNotConfigured,

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Response did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Pending operations could not be persisted.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create storage directory.
    #[error("failed to create directory: {0}")]
    CreateDirectory(String),

    /// Failed to read the state file.
    #[error("failed to read file: {0}")]
    ReadFile(String),

    /// Failed to write the state file.
    #[error("failed to write file: {0}")]
    WriteFile(String),
}
