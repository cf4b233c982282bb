//! Error types for the agents.

use thiserror::Error;

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors that can occur in the agents.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration rejected before any remote call was made.
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] yagent_embeddings::EmbeddingError),

    /// Operation tracking error.
    #[error("operation error: {0}")]
    Operation(#[from] yagent_operations::OperationError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
