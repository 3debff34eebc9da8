//! # API Docs Embeddings
//!
//! Text embedding for the document store and the retrieval core.
//!
//! Two embedders implement [`Embedder`]:
//!
//! - [`HashEmbedder`]: deterministic FNV-1a bag-of-words vectors. No model files,
//!   always available, and the embedder used by tests.
//! - `EmbeddingService` (feature `local-model`): All-MiniLM-L6-v2 via fastembed-rs,
//!   the same family of model the documentation store was built around.
//!
//! ## Example
//!
//! ```
//! use apidocs_embeddings::{Embedder, HashEmbedder, cosine_similarity};
//!
//! let embedder = HashEmbedder::new(64);
//! let a = embedder.embed_single("refresh token expired").unwrap();
//! let b = embedder.embed_single("expired refresh token").unwrap();
//! assert!(cosine_similarity(&a, &b) > 0.99);
//! ```

mod error;
mod hash;
#[cfg(feature = "local-model")]
mod service;

pub use error::EmbeddingError;
pub use hash::HashEmbedder;
#[cfg(feature = "local-model")]
pub use service::{EmbeddingConfig, EmbeddingModelType, EmbeddingService};

/// Embedding dimension of All-MiniLM-L6-v2
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Anything that can turn text into dense vectors.
pub trait Embedder: Send + Sync {
    /// Generate embeddings for a list of texts, one vector per input, in order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Dimension of the vectors produced by this embedder
    fn dimension(&self) -> usize;

    /// Generate a single embedding for a text
    fn embed_single(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut embeddings = self.embed(&[text.to_string()])?;
        embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::EmbeddingGeneration("No embedding generated".into()))
    }
}

/// Cosine similarity of two vectors.
///
/// A zero-norm vector is similar to nothing: the result is `0.0` rather than NaN.
/// Vectors of different length are compared over their common prefix.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}
