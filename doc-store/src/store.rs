use crate::document::{Document, Filters, StoreHit};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;

/// The document store as seen by the retrieval core.
///
/// Implementations own the documents and their embeddings. Every call may
/// fail; callers decide how to degrade.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Nearest-neighbour query: up to `k` documents ranked by similarity to
    /// `text`, restricted to documents matching `filters` when given.
    async fn query(
        &self,
        text: &str,
        k: usize,
        filters: Option<&Filters>,
    ) -> Result<Vec<StoreHit>, StoreError>;

    /// Every stored document, in insertion order.
    async fn get_all(&self) -> Result<Vec<Document>, StoreError>;

    /// Stored embeddings for `ids`. Unknown ids are absent from the map.
    async fn get_embeddings(&self, ids: &[String])
    -> Result<HashMap<String, Vec<f32>>, StoreError>;

    /// Embed arbitrary texts with the store's embedding function.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError>;
}
