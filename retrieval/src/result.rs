use crate::cache::CacheHitKind;
use serde::{Deserialize, Serialize};

/// Final ranked documents for a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Query text after filter extraction
    pub query: String,

    /// Document contents, best first
    pub documents: Vec<String>,

    /// Document ids, parallel to `documents`
    pub ids: Vec<String>,

    /// Search statistics
    pub stats: SearchStats,
}

/// Search performance statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Total search time in milliseconds
    pub total_time_ms: u64,

    /// Query expansion time in milliseconds
    pub expansion_time_ms: u64,

    /// Lexical + vector retrieval time across all variants, in milliseconds
    pub retrieval_time_ms: u64,

    /// Fusion time in milliseconds
    pub fusion_time_ms: u64,

    /// Candidate embedding fetch time in milliseconds
    pub fetch_time_ms: u64,

    /// MMR time in milliseconds
    pub mmr_time_ms: u64,

    /// Query variants searched (original included)
    pub variants: usize,

    /// Lexical hits across all variants
    pub lexical_count: usize,

    /// Vector hits across all variants
    pub vector_count: usize,

    /// Distinct ids in the fusion table
    pub fused_count: usize,

    /// Candidates handed to diversification
    pub candidate_count: usize,

    /// Which cache tier answered, if any
    pub cache_hit: Option<CacheHitKind>,

    /// Vector queries that failed and contributed no hits
    pub vector_failures: usize,

    /// Candidate embeddings could not be fetched; fused order was used
    pub embedding_fetch_failed: bool,

    /// The text generator failed; only the original query was searched
    pub expansion_failed: bool,

    /// The query could not be embedded; semantic cache and MMR were skipped
    pub query_embedding_failed: bool,
}

impl SearchStats {
    /// Whether any upstream dependency failed during this search
    pub fn degraded(&self) -> bool {
        self.vector_failures > 0
            || self.embedding_fetch_failed
            || self.expansion_failed
            || self.query_embedding_failed
    }
}

impl SearchResults {
    /// Create empty search results
    pub fn new(query: String) -> Self {
        Self {
            query,
            ..Default::default()
        }
    }

    /// Append one document
    pub fn push(&mut self, id: String, content: String) {
        self.ids.push(id);
        self.documents.push(content);
    }

    /// Set stats
    pub fn with_stats(mut self, stats: SearchStats) -> Self {
        self.stats = stats;
        self
    }

    /// `(id, content)` pairs, best first
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.ids
            .iter()
            .map(String::as_str)
            .zip(self.documents.iter().map(String::as_str))
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of results
    pub fn len(&self) -> usize {
        self.ids.len()
    }
}
