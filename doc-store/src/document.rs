use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form string metadata attached to a document (`source`, `type`, `method`, ...)
pub type Metadata = BTreeMap<String, String>;

/// Metadata constraints. Kept sorted by key so equal filter sets compare and
/// hash identically.
pub type Filters = BTreeMap<String, String>;

/// A documentation snippet as stored
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier
    pub id: String,

    /// Snippet text
    pub content: String,

    /// Additional metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a new document without metadata
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Builder-style metadata entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether every filter key is present with an equal value, compared
    /// case-insensitively. Missing keys never match.
    pub fn matches_filters(&self, filters: &Filters) -> bool {
        metadata_matches(&self.metadata, filters)
    }
}

/// Case-insensitive equality check of every filter pair against `metadata`.
pub fn metadata_matches(metadata: &Metadata, filters: &Filters) -> bool {
    filters.iter().all(|(key, expected)| {
        metadata
            .get(key)
            .is_some_and(|actual| actual.to_lowercase() == expected.to_lowercase())
    })
}

/// A ranked hit returned by [`crate::DocumentStore::query`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    /// The matched document
    pub document: Document,

    /// Similarity score (higher is better)
    pub score: f32,

    /// Stored embedding, when the store returns it
    pub embedding: Option<Vec<f32>>,
}
