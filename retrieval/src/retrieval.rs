use crate::cache::{CacheHitKind, CacheKey, CacheStats, SearchCache};
use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};
use crate::expansion::QueryExpander;
use crate::filter::parse_query;
use crate::fusion::{FusedId, FusionEngine};
use crate::lexical::LexicalIndex;
use crate::mmr::{Candidate, diversify};
use crate::result::{SearchResults, SearchStats};
use apidocs_doc_store::{DocumentStore, Filters};
use apidocs_llm_client::TextGenerator;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Hybrid retrieval engine combining BM25 and vector search with RRF fusion,
/// MMR diversification and a two-tier cache
pub struct HybridRetriever {
    config: RetrievalConfig,
    store: Arc<dyn DocumentStore>,
    expander: QueryExpander,
    fusion: FusionEngine,
    lexical: RwLock<Arc<LexicalIndex>>,
    cache: SearchCache<SearchResults>,
}

impl HybridRetriever {
    /// Create a retriever over `store`.
    ///
    /// The lexical index starts empty; call [`HybridRetriever::sync`] once the
    /// store holds documents.
    pub fn new(
        config: RetrievalConfig,
        store: Arc<dyn DocumentStore>,
        generator: Option<Arc<dyn TextGenerator>>,
    ) -> Result<Self> {
        config.validate().map_err(RetrievalError::InvalidConfig)?;

        info!("Initializing hybrid retriever");

        let generator = generator.filter(|_| config.enable_expansion);
        let expander = QueryExpander::new(generator, config.max_query_variations);
        let fusion = FusionEngine::new(config.rrf_k);
        let cache = SearchCache::new(&config.cache);

        Ok(Self {
            config,
            store,
            expander,
            fusion,
            lexical: RwLock::new(Arc::new(LexicalIndex::default())),
            cache,
        })
    }

    /// Rebuild the lexical index from every document in the store.
    ///
    /// The new index replaces the old one atomically; in-flight searches keep
    /// the snapshot they started with. Clears the cache. On error the previous
    /// index stays in place.
    pub async fn sync(&self) -> Result<usize> {
        let start = Instant::now();
        let documents = self.store.get_all().await?;
        let index = Arc::new(LexicalIndex::build(documents, self.config.bm25));
        let count = index.len();

        *self.lexical.write().await = index;
        self.cache.clear().await;

        info!(
            "Lexical index synced with {count} documents in {}ms",
            start.elapsed().as_millis()
        );
        Ok(count)
    }

    /// Search for the `n_results` most relevant and diverse documents.
    ///
    /// `key:value` tokens in `query` become metadata filters; explicit
    /// `filters` win on key collision. Upstream failures degrade the result
    /// (see [`SearchStats`]) instead of failing the call.
    pub async fn search(
        &self,
        query: &str,
        n_results: usize,
        filters: Option<&Filters>,
    ) -> Result<SearchResults> {
        let start = Instant::now();

        if n_results == 0 {
            return Err(RetrievalError::InvalidArgument(
                "n_results must be > 0".to_string(),
            ));
        }

        let parsed = parse_query(query);
        let mut merged = parsed.filters;
        if let Some(explicit) = filters {
            merged.extend(explicit.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let clean = parsed.clean;

        // An empty clean query still runs: the vector channel returns the
        // documents matching the filters
        debug!("Hybrid search for '{clean}' with filters {merged:?}");

        let key = CacheKey::new(&clean, &merged);
        if self.config.enable_cache {
            if let Some(cached) = self.cache.get_exact(&key).await {
                info!("Cache hit for query: '{clean}'");
                return Ok(Self::from_cache(cached, clean, CacheHitKind::Exact, start));
            }
        }

        let mut stats = SearchStats::default();
        let query_embedding = self.embed_query(&clean, &mut stats).await;

        let semantic_hit = match (self.config.enable_cache, query_embedding.as_deref()) {
            (true, Some(embedding)) => self.cache.get_similar(&key, embedding).await,
            _ => None,
        };
        if let Some((cached, similarity)) = semantic_hit {
            info!("Semantic cache hit for query: '{clean}' (similarity {similarity:.3})");
            return Ok(Self::from_cache(cached, clean, CacheHitKind::Semantic, start));
        }

        // Stage 1: expansion
        let expansion_start = Instant::now();
        let expansion = self.expander.expand(&clean).await;
        stats.expansion_failed = expansion.failed;
        stats.variants = expansion.queries.len();
        stats.expansion_time_ms = expansion_start.elapsed().as_millis() as u64;

        // Stage 2: vector + lexical retrieval per variant
        let index = self.lexical.read().await.clone();
        let retrieval_start = Instant::now();
        let mut vector_lists = Vec::with_capacity(expansion.queries.len());
        let mut lexical_lists = Vec::with_capacity(expansion.queries.len());
        for variant in &expansion.queries {
            if let Some(ids) = self
                .vector_hits(&index, variant, n_results, &merged, &mut stats)
                .await
            {
                vector_lists.push(ids);
            }
            lexical_lists.push(self.lexical_hits(&index, variant, n_results, &merged, &mut stats));
        }
        stats.retrieval_time_ms = retrieval_start.elapsed().as_millis() as u64;

        // Stage 3: fusion. Every variant's vector list is added before any
        // lexical list, so equal scores rank vector hits first.
        let fusion_start = Instant::now();
        let mut table = self.fusion.table();
        for list in vector_lists.into_iter().chain(lexical_lists) {
            table.add_ranked(list);
        }
        stats.fused_count = table.len();
        let fused = table.top(n_results.saturating_mul(self.config.candidate_oversample));
        stats.fusion_time_ms = fusion_start.elapsed().as_millis() as u64;

        // Stage 4 + 5: candidate embeddings, then MMR
        let mut results = SearchResults::new(clean.clone());
        let selected = self
            .select(&index, fused, query_embedding.as_deref(), n_results, &mut stats)
            .await?;
        for candidate in selected {
            results.push(candidate.id, candidate.content);
        }

        stats.total_time_ms = start.elapsed().as_millis() as u64;
        let results = results.with_stats(stats);

        if self.config.enable_cache {
            if results.stats.degraded() {
                debug!("Not caching degraded results for '{clean}'");
            } else {
                self.cache.set(key, query_embedding, results.clone()).await;
            }
        }

        info!(
            "Search completed in {}ms, returned {} results",
            results.stats.total_time_ms,
            results.len()
        );

        Ok(results)
    }

    fn from_cache(
        mut cached: SearchResults,
        query: String,
        kind: CacheHitKind,
        start: Instant,
    ) -> SearchResults {
        cached.query = query;
        cached.stats.cache_hit = Some(kind);
        cached.stats.total_time_ms = start.elapsed().as_millis() as u64;
        cached
    }

    async fn embed_query(&self, query: &str, stats: &mut SearchStats) -> Option<Vec<f32>> {
        match self.store.embed(&[query.to_string()]).await {
            Ok(vectors) => {
                let embedding = vectors.into_iter().next();
                if embedding.is_none() {
                    warn!("Store returned no embedding for the query");
                    stats.query_embedding_failed = true;
                }
                embedding
            }
            Err(e) => {
                warn!("Query embedding failed, skipping semantic cache and MMR: {e}");
                stats.query_embedding_failed = true;
                None
            }
        }
    }

    /// Vector hits for one variant, restricted to ids in the current index.
    /// `None` when the store query failed.
    async fn vector_hits(
        &self,
        index: &LexicalIndex,
        variant: &str,
        n_results: usize,
        filters: &Filters,
        stats: &mut SearchStats,
    ) -> Option<Vec<String>> {
        let store_filters = (!filters.is_empty()).then_some(filters);
        let vector_k = n_results.saturating_mul(self.config.vector_oversample);
        match self.store.query(variant, vector_k, store_filters).await {
            Ok(hits) => {
                // Ids unknown to the current index were added after the last sync
                let ids: Vec<String> = hits
                    .into_iter()
                    .map(|hit| hit.document.id)
                    .filter(|id| index.get(id).is_some())
                    .collect();
                stats.vector_count += ids.len();
                Some(ids)
            }
            Err(e) => {
                warn!("Vector search failed for '{variant}': {e}");
                stats.vector_failures += 1;
                None
            }
        }
    }

    fn lexical_hits(
        &self,
        index: &LexicalIndex,
        variant: &str,
        n_results: usize,
        filters: &Filters,
        stats: &mut SearchStats,
    ) -> Vec<String> {
        let lexical_k = n_results.saturating_mul(self.config.lexical_oversample);
        let hits = index.search(variant, lexical_k, Some(filters));
        stats.lexical_count += hits.len();
        hits.into_iter().map(|hit| hit.id).collect()
    }

    /// Fetch candidate embeddings and diversify; falls back to fused order
    /// when either the query or the candidates cannot be embedded
    async fn select(
        &self,
        index: &LexicalIndex,
        fused: Vec<FusedId>,
        query_embedding: Option<&[f32]>,
        n_results: usize,
        stats: &mut SearchStats,
    ) -> Result<Vec<Candidate>> {
        if fused.is_empty() {
            return Ok(Vec::new());
        }

        let Some(query_embedding) = query_embedding else {
            return Ok(Self::in_fused_order(index, fused, n_results));
        };

        let fetch_start = Instant::now();
        let ids: Vec<String> = fused.iter().map(|f| f.id.clone()).collect();
        let embeddings = match self.store.get_embeddings(&ids).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                warn!("Candidate embedding fetch failed, using fused order: {e}");
                stats.embedding_fetch_failed = true;
                stats.fetch_time_ms = fetch_start.elapsed().as_millis() as u64;
                return Ok(Self::in_fused_order(index, fused, n_results));
            }
        };

        let mut candidates: Vec<Candidate> = Vec::with_capacity(fused.len());
        for FusedId { id, .. } in fused {
            let (Some(doc), Some(embedding)) = (index.get(&id), embeddings.get(&id)) else {
                debug!("No embedding for candidate '{id}', skipping");
                continue;
            };
            candidates.push(Candidate {
                embedding: embedding.clone(),
                content: doc.content.clone(),
                id,
            });
        }
        stats.candidate_count = candidates.len();
        stats.fetch_time_ms = fetch_start.elapsed().as_millis() as u64;

        let mmr_start = Instant::now();
        let picks = diversify(
            query_embedding,
            &candidates,
            n_results,
            self.config.mmr_lambda,
        )?;
        stats.mmr_time_ms = mmr_start.elapsed().as_millis() as u64;
        debug!(
            "MMR selected {} of {} candidates",
            picks.len(),
            candidates.len()
        );

        let mut slots: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
        Ok(picks
            .into_iter()
            .filter_map(|pick| slots.get_mut(pick).and_then(Option::take))
            .collect())
    }

    fn in_fused_order(index: &LexicalIndex, fused: Vec<FusedId>, n_results: usize) -> Vec<Candidate> {
        fused
            .into_iter()
            .filter_map(|FusedId { id, .. }| {
                let content = index.get(&id)?.content.clone();
                Some(Candidate {
                    id,
                    embedding: Vec::new(),
                    content,
                })
            })
            .take(n_results)
            .collect()
    }

    /// Clear search cache
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
        info!("Search cache cleared");
    }

    /// Get cache statistics
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Documents in the current lexical index snapshot
    pub async fn indexed_documents(&self) -> usize {
        self.lexical.read().await.len()
    }

    /// Get configuration
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }
}
