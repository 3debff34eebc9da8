use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The model could not be loaded or downloaded
    #[error("Failed to initialize embedding model: {0}")]
    ModelInitialization(String),

    #[error("Failed to generate embeddings: {0}")]
    EmbeddingGeneration(String),

    /// Rejected configuration or input
    #[error("Invalid embedding input: {0}")]
    InvalidInput(String),
}
