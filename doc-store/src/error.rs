use apidocs_embeddings::EmbeddingError;
use thiserror::Error;

/// Errors that can occur during document store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to initialize the store
    #[error("Failed to initialize document store: {0}")]
    Initialization(String),

    /// The store (or the service behind it) could not be reached
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    /// Embedder produced vectors of the wrong size
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding error
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
