// Exact (brute-force) document store with JSON persistence.

use crate::document::{Document, Filters, StoreHit};
use crate::error::StoreError;
use crate::store::DocumentStore;
use apidocs_embeddings::{Embedder, cosine_similarity};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Configuration for the local document store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// File the store is persisted to. `None` keeps everything in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Dimension every embedding must have
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

fn default_embedding_dim() -> usize {
    apidocs_embeddings::DEFAULT_EMBEDDING_DIM
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            embedding_dim: default_embedding_dim(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument {
    document: Document,
    vector: Vec<f32>,
}

#[derive(Default)]
struct Inner {
    documents: Vec<StoredDocument>,
    by_id: HashMap<String, usize>,
}

impl Inner {
    fn from_documents(documents: Vec<StoredDocument>) -> Self {
        let by_id = documents
            .iter()
            .enumerate()
            .map(|(idx, stored)| (stored.document.id.clone(), idx))
            .collect();
        Self { documents, by_id }
    }
}

/// In-process document store doing exact cosine search over every vector
pub struct LocalDocumentStore {
    config: StoreConfig,
    embedder: Arc<dyn Embedder>,
    inner: RwLock<Inner>,
}

impl LocalDocumentStore {
    /// Open (or create) a store with the given configuration
    pub async fn open(config: StoreConfig, embedder: Arc<dyn Embedder>) -> Result<Self, StoreError> {
        if embedder.dimension() != config.embedding_dim {
            return Err(StoreError::DimensionMismatch {
                expected: config.embedding_dim,
                actual: embedder.dimension(),
            });
        }

        let documents = match &config.path {
            Some(path) => {
                info!("Initializing document store at {}", path.display());
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                if path.exists() {
                    match Self::load_from_disk(path).await {
                        Ok(data) => data,
                        Err(e) => {
                            warn!("Could not load existing store data: {e}, starting fresh");
                            Vec::new()
                        }
                    }
                } else {
                    Vec::new()
                }
            }
            None => Vec::new(),
        };

        info!("Document store ready with {} documents", documents.len());
        Ok(Self {
            config,
            embedder,
            inner: RwLock::new(Inner::from_documents(documents)),
        })
    }

    /// Purely in-memory store
    pub async fn in_memory(embedder: Arc<dyn Embedder>) -> Result<Self, StoreError> {
        let config = StoreConfig {
            path: None,
            embedding_dim: embedder.dimension(),
        };
        Self::open(config, embedder).await
    }

    async fn load_from_disk(path: &Path) -> Result<Vec<StoredDocument>, StoreError> {
        let content = tokio::fs::read(path).await?;
        let documents: Vec<StoredDocument> = serde_json::from_slice(&content)?;
        Ok(documents)
    }

    async fn save_to_disk(&self, inner: &Inner) -> Result<(), StoreError> {
        if let Some(path) = &self.config.path {
            let content = serde_json::to_vec(&inner.documents)?;
            tokio::fs::write(path, content).await?;
        }
        Ok(())
    }

    fn embed_checked(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        let vectors = self.embedder.embed(texts)?;
        if let Some(bad) = vectors
            .iter()
            .find(|v| v.len() != self.config.embedding_dim)
        {
            return Err(StoreError::DimensionMismatch {
                expected: self.config.embedding_dim,
                actual: bad.len(),
            });
        }
        Ok(vectors)
    }

    /// Embed and store documents. Documents whose id already exists are
    /// skipped: stored records are immutable. Returns the number added.
    pub async fn add_documents(&self, documents: Vec<Document>) -> Result<usize, StoreError> {
        if documents.is_empty() {
            return Ok(0);
        }

        let mut inner = self.inner.write().await;

        let mut fresh: Vec<Document> = Vec::with_capacity(documents.len());
        for doc in documents {
            if inner.by_id.contains_key(&doc.id) || fresh.iter().any(|d| d.id == doc.id) {
                warn!("Document '{}' already stored, skipping", doc.id);
                continue;
            }
            fresh.push(doc);
        }
        if fresh.is_empty() {
            return Ok(0);
        }

        info!("Adding {} documents to store", fresh.len());
        let texts: Vec<String> = fresh.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embed_checked(&texts)?;

        let added = fresh.len();
        for (document, vector) in fresh.into_iter().zip(vectors) {
            let idx = inner.documents.len();
            inner.by_id.insert(document.id.clone(), idx);
            inner.documents.push(StoredDocument { document, vector });
        }

        self.save_to_disk(&inner).await?;
        Ok(added)
    }

    /// Number of stored documents
    pub async fn count(&self) -> usize {
        self.inner.read().await.documents.len()
    }

    /// Remove every document
    pub async fn reset(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        *inner = Inner::default();
        self.save_to_disk(&inner).await?;
        info!("Document store reset");
        Ok(())
    }

    /// Get the configuration of this store
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn query(
        &self,
        text: &str,
        k: usize,
        filters: Option<&Filters>,
    ) -> Result<Vec<StoreHit>, StoreError> {
        debug!("Querying store for '{text}' (k: {k}, filters: {filters:?})");
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embed_checked(&[text.to_string()])?
            .pop()
            .ok_or_else(|| StoreError::Unavailable("embedder returned no vector".to_string()))?;

        let inner = self.inner.read().await;
        let mut scored: Vec<(usize, f32)> = inner
            .documents
            .iter()
            .enumerate()
            .filter(|(_, stored)| filters.is_none_or(|f| stored.document.matches_filters(f)))
            .map(|(idx, stored)| (idx, cosine_similarity(&query_vector, &stored.vector)))
            .collect();

        // Stable: equal similarity keeps insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        let hits: Vec<StoreHit> = scored
            .into_iter()
            .map(|(idx, score)| {
                let stored = &inner.documents[idx];
                StoreHit {
                    document: stored.document.clone(),
                    score,
                    embedding: Some(stored.vector.clone()),
                }
            })
            .collect();

        debug!("Store returned {} hits", hits.len());
        Ok(hits)
    }

    async fn get_all(&self) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .documents
            .iter()
            .map(|stored| stored.document.clone())
            .collect())
    }

    async fn get_embeddings(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<f32>>, StoreError> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                inner
                    .by_id
                    .get(id)
                    .map(|idx| (id.clone(), inner.documents[*idx].vector.clone()))
            })
            .collect())
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        self.embed_checked(texts)
    }
}
