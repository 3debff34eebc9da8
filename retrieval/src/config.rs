use serde::{Deserialize, Serialize};

/// BM25 ranking parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term-frequency saturation
    #[serde(default = "default_k1")]
    pub k1: f32,

    /// Length normalization strength (0.0 = none, 1.0 = full)
    #[serde(default = "default_b")]
    pub b: f32,
}

/// Two-tier result cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Max entries in the exact (normalized query + filters) tier
    #[serde(default = "default_exact_capacity")]
    pub exact_capacity: usize,

    /// Time-to-live of exact-tier entries, in seconds
    #[serde(default = "default_exact_ttl_secs")]
    pub exact_ttl_secs: u64,

    /// Max entries in the embedding-similarity tier
    #[serde(default = "default_semantic_capacity")]
    pub semantic_capacity: usize,

    /// Cosine similarity a cached query must exceed to be reused
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f32,
}

/// Configuration for hybrid retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// RRF constant k (higher = less emphasis on top ranks)
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// Lexical hits per variant = n_results * lexical_oversample
    #[serde(default = "default_lexical_oversample")]
    pub lexical_oversample: usize,

    /// Vector hits per variant = n_results * vector_oversample
    #[serde(default = "default_vector_oversample")]
    pub vector_oversample: usize,

    /// Fused ids kept for diversification = n_results * candidate_oversample
    #[serde(default = "default_candidate_oversample")]
    pub candidate_oversample: usize,

    /// MMR trade-off: 1.0 = pure relevance, 0.0 = pure novelty
    #[serde(default = "default_mmr_lambda")]
    pub mmr_lambda: f32,

    /// Generated paraphrases added to the original query
    #[serde(default = "default_max_query_variations")]
    pub max_query_variations: usize,

    /// Expand queries through the text generator when one is configured
    #[serde(default = "default_true")]
    pub enable_expansion: bool,

    /// Enable caching of search results
    #[serde(default = "default_true")]
    pub enable_cache: bool,

    #[serde(default)]
    pub bm25: Bm25Params,

    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_k1() -> f32 {
    1.5
}

fn default_b() -> f32 {
    0.75
}

fn default_exact_capacity() -> usize {
    1000
}

fn default_exact_ttl_secs() -> u64 {
    3600
}

fn default_semantic_capacity() -> usize {
    500
}

fn default_semantic_threshold() -> f32 {
    0.95
}

fn default_rrf_k() -> f32 {
    60.0
}

fn default_lexical_oversample() -> usize {
    4
}

fn default_vector_oversample() -> usize {
    2
}

fn default_candidate_oversample() -> usize {
    3
}

fn default_mmr_lambda() -> f32 {
    0.5
}

fn default_max_query_variations() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            exact_capacity: default_exact_capacity(),
            exact_ttl_secs: default_exact_ttl_secs(),
            semantic_capacity: default_semantic_capacity(),
            semantic_threshold: default_semantic_threshold(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            lexical_oversample: default_lexical_oversample(),
            vector_oversample: default_vector_oversample(),
            candidate_oversample: default_candidate_oversample(),
            mmr_lambda: default_mmr_lambda(),
            max_query_variations: default_max_query_variations(),
            enable_expansion: true,
            enable_cache: true,
            bm25: Bm25Params::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl RetrievalConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.rrf_k.is_nan() || self.rrf_k <= 0.0 {
            return Err(format!("rrf_k must be > 0, got {}", self.rrf_k));
        }

        if self.lexical_oversample == 0 || self.vector_oversample == 0 {
            return Err("lexical_oversample and vector_oversample must be > 0".to_string());
        }

        if self.candidate_oversample == 0 {
            return Err("candidate_oversample must be > 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.mmr_lambda) {
            return Err(format!(
                "mmr_lambda must be in [0.0, 1.0], got {}",
                self.mmr_lambda
            ));
        }

        if self.bm25.k1.is_nan() || self.bm25.k1 < 0.0 {
            return Err(format!("bm25.k1 must be >= 0, got {}", self.bm25.k1));
        }

        if !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(format!("bm25.b must be in [0.0, 1.0], got {}", self.bm25.b));
        }

        if self.enable_cache {
            if self.cache.exact_capacity == 0 {
                return Err("cache.exact_capacity must be > 0".to_string());
            }

            if !(-1.0..=1.0).contains(&self.cache.semantic_threshold) {
                return Err(format!(
                    "cache.semantic_threshold must be in [-1.0, 1.0], got {}",
                    self.cache.semantic_threshold
                ));
            }
        }

        Ok(())
    }

    /// Lexical and vector channels only: no query expansion, no cache
    pub fn uncached() -> Self {
        Self {
            enable_expansion: false,
            enable_cache: false,
            ..Default::default()
        }
    }
}
