use apidocs_doc_store::{
    Document, DocumentStore, Filters, LocalDocumentStore, StoreError, StoreHit,
};
use apidocs_embeddings::HashEmbedder;
use apidocs_llm_client::{GenerationError, TextGenerator};
use apidocs_retrieval::{CacheHitKind, HybridRetriever, RetrievalConfig, RetrievalError};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Store whose vector channel returns a fixed ranking, with switchable failures
#[derive(Default)]
struct FakeStore {
    documents: Vec<Document>,
    vector_ranking: Vec<String>,
    /// Per-text rankings that take precedence over `vector_ranking`
    rankings_by_text: HashMap<String, Vec<String>>,
    embeddings: HashMap<String, Vec<f32>>,
    query_embedding: Vec<f32>,
    fail_query: bool,
    fail_get_embeddings: bool,
    fail_embed: bool,
    embed_calls: AtomicUsize,
    query_calls: AtomicUsize,
    seen_filters: Mutex<Vec<Option<Filters>>>,
}

impl FakeStore {
    fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn query(
        &self,
        text: &str,
        k: usize,
        filters: Option<&Filters>,
    ) -> Result<Vec<StoreHit>, StoreError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_filters.lock().unwrap().push(filters.cloned());
        if self.fail_query {
            return Err(StoreError::Unavailable("vector index offline".to_string()));
        }

        let ranking = self
            .rankings_by_text
            .get(text)
            .unwrap_or(&self.vector_ranking);
        let hits = ranking
            .iter()
            .enumerate()
            .map(|(rank, id)| {
                let document = self
                    .documents
                    .iter()
                    .find(|d| &d.id == id)
                    .cloned()
                    .unwrap_or_else(|| Document::new(id.clone(), "not synced yet"));
                StoreHit {
                    document,
                    score: 1.0 - rank as f32 * 0.1,
                    embedding: None,
                }
            })
            .filter(|hit| filters.is_none_or(|f| hit.document.matches_filters(f)))
            .take(k)
            .collect();
        Ok(hits)
    }

    async fn get_all(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.documents.clone())
    }

    async fn get_embeddings(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<f32>>, StoreError> {
        if self.fail_get_embeddings {
            return Err(StoreError::Unavailable("timeout".to_string()));
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.embeddings.get(id).map(|e| (id.clone(), e.clone())))
            .collect())
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embed {
            return Err(StoreError::Unavailable("embedding model not loaded".to_string()));
        }
        Ok(texts.iter().map(|_| self.query_embedding.clone()).collect())
    }
}

/// Dogs and cats are semantically close to each other; the exception doc is
/// only reachable through its distinctive tokens.
fn pets_and_exception() -> FakeStore {
    FakeStore {
        documents: vec![
            Document::new("id1", "Semantic Doc about Dogs").with_meta("type", "animal"),
            Document::new("id2", "Semantic Doc about Cats").with_meta("type", "animal"),
            Document::new("id3", "Keyword Doc about Python Exception 0x123")
                .with_meta("type", "tech"),
        ],
        vector_ranking: vec!["id1".to_string(), "id2".to_string()],
        embeddings: HashMap::from([
            ("id1".to_string(), vec![0.0, 1.0, 0.0]),
            ("id2".to_string(), vec![0.0, 1.0, 0.0]),
            ("id3".to_string(), vec![1.0, 0.0, 0.0]),
        ]),
        query_embedding: vec![1.0, 0.0, 0.0],
        ..Default::default()
    }
}

async fn synced(store: Arc<FakeStore>, config: RetrievalConfig) -> HybridRetriever {
    let retriever = HybridRetriever::new(config, store, None).unwrap();
    retriever.sync().await.unwrap();
    retriever
}

struct Paraphraser {
    reply: Option<String>,
    calls: AtomicUsize,
}

#[async_trait]
impl TextGenerator for Paraphraser {
    async fn generate(&self, _prompt: &str) -> apidocs_llm_client::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => Err(GenerationError::CircuitOpen { retry_in_secs: 60 }),
        }
    }
}

#[test_log::test(tokio::test)]
async fn lexical_channel_finds_what_vector_search_misses() {
    let store = Arc::new(pets_and_exception());
    let retriever = synced(store.clone(), RetrievalConfig::default()).await;

    let results = retriever
        .search("Python Exception 0x123", 3, None)
        .await
        .unwrap();

    assert!(!store.vector_ranking.contains(&"id3".to_string()));
    assert_eq!(results.ids, vec!["id3", "id1", "id2"]);
    assert_eq!(results.documents[0], "Keyword Doc about Python Exception 0x123");
    assert_eq!(results.stats.lexical_count, 1);
    assert_eq!(results.stats.vector_count, 2);
    assert_eq!(results.stats.candidate_count, 3);
    assert!(!results.stats.degraded());
}

#[tokio::test]
async fn repeated_query_is_an_exact_cache_hit_without_embedding() {
    let store = Arc::new(pets_and_exception());
    let retriever = synced(store.clone(), RetrievalConfig::default()).await;

    let first = retriever.search("python exception", 2, None).await.unwrap();
    assert_eq!(first.stats.cache_hit, None);
    let embeds = store.embed_calls();
    let queries = store.query_calls();

    let second = retriever
        .search("  Python   EXCEPTION ", 2, None)
        .await
        .unwrap();
    assert_eq!(second.stats.cache_hit, Some(CacheHitKind::Exact));
    assert_eq!(second.ids, first.ids);
    assert_eq!(second.documents, first.documents);
    assert_eq!(store.embed_calls(), embeds);
    assert_eq!(store.query_calls(), queries);
}

#[tokio::test]
async fn similar_query_is_a_semantic_cache_hit() {
    let store = Arc::new(pets_and_exception());
    let retriever = synced(store.clone(), RetrievalConfig::default()).await;

    let first = retriever.search("python exception", 2, None).await.unwrap();
    let queries = store.query_calls();

    // The fake store embeds every text identically
    let second = retriever.search("exception in python", 2, None).await.unwrap();
    assert_eq!(second.stats.cache_hit, Some(CacheHitKind::Semantic));
    assert_eq!(second.ids, first.ids);
    assert_eq!(second.query, "exception in python");
    assert_eq!(store.query_calls(), queries);
}

#[tokio::test]
async fn semantic_cache_does_not_cross_filters() {
    let store = Arc::new(pets_and_exception());
    let retriever = synced(store.clone(), RetrievalConfig::default()).await;

    retriever.search("doc about", 2, None).await.unwrap();
    let filtered = retriever.search("doc about type:tech", 2, None).await.unwrap();

    assert_eq!(filtered.stats.cache_hit, None);
    assert_eq!(filtered.ids, vec!["id3"]);
}

#[tokio::test]
async fn explicit_filters_override_embedded_ones() {
    let store = Arc::new(pets_and_exception());
    let retriever = synced(store.clone(), RetrievalConfig::uncached()).await;

    let explicit: Filters = [("type".to_string(), "Animal".to_string())].into();
    let results = retriever
        .search("doc type:tech", 3, Some(&explicit))
        .await
        .unwrap();

    assert_eq!(results.query, "doc");
    assert_eq!(results.ids, vec!["id1", "id2"]);
    let seen = store.seen_filters.lock().unwrap();
    assert_eq!(seen.last().cloned().flatten(), Some(explicit));
}

#[tokio::test]
async fn vector_failure_degrades_to_lexical_and_is_not_cached() {
    let store = Arc::new(FakeStore {
        fail_query: true,
        ..pets_and_exception()
    });
    let retriever = synced(store.clone(), RetrievalConfig::default()).await;

    let results = retriever.search("python exception", 3, None).await.unwrap();
    assert_eq!(results.ids, vec!["id3"]);
    assert_eq!(results.stats.vector_failures, 1);
    assert!(results.stats.degraded());

    let again = retriever.search("python exception", 3, None).await.unwrap();
    assert_eq!(again.stats.cache_hit, None);
    assert_eq!(retriever.cache_stats().await.exact_size, 0);
}

#[tokio::test]
async fn embedding_fetch_failure_keeps_fused_order() {
    let store = Arc::new(FakeStore {
        fail_get_embeddings: true,
        ..pets_and_exception()
    });
    let retriever = synced(store, RetrievalConfig::uncached()).await;

    let results = retriever
        .search("Python Exception 0x123", 2, None)
        .await
        .unwrap();

    // Vector list first: id1 and id3 tie at rank 0, id1 was seen first
    assert_eq!(results.ids, vec!["id1", "id3"]);
    assert!(results.stats.embedding_fetch_failed);
}

#[tokio::test]
async fn query_embedding_failure_skips_mmr() {
    let store = Arc::new(FakeStore {
        fail_embed: true,
        ..pets_and_exception()
    });
    let retriever = synced(store, RetrievalConfig::default()).await;

    let results = retriever
        .search("Python Exception 0x123", 3, None)
        .await
        .unwrap();

    assert_eq!(results.ids, vec!["id1", "id3", "id2"]);
    assert!(results.stats.query_embedding_failed);
    assert_eq!(results.stats.cache_hit, None);
}

#[tokio::test]
async fn candidates_without_embeddings_are_skipped() {
    let mut fake = pets_and_exception();
    fake.embeddings.remove("id1");
    let retriever = synced(Arc::new(fake), RetrievalConfig::uncached()).await;

    let results = retriever
        .search("Python Exception 0x123", 3, None)
        .await
        .unwrap();
    assert_eq!(results.ids, vec!["id3", "id2"]);
    assert_eq!(results.stats.candidate_count, 2);
}

#[tokio::test]
async fn ids_missing_from_the_index_are_dropped() {
    let store = Arc::new(FakeStore {
        vector_ranking: vec!["ghost".to_string(), "id2".to_string()],
        ..pets_and_exception()
    });
    let retriever = synced(store, RetrievalConfig::uncached()).await;

    let results = retriever.search("cats", 3, None).await.unwrap();
    assert_eq!(results.ids, vec!["id2"]);
    assert_eq!(results.stats.vector_count, 1);
}

#[tokio::test]
async fn expansion_variants_are_searched() {
    let generator = Arc::new(Paraphraser {
        reply: Some("1. dogs\n2. cats\n3. python".to_string()),
        calls: AtomicUsize::new(0),
    });
    let store = Arc::new(pets_and_exception());
    let retriever =
        HybridRetriever::new(RetrievalConfig::default(), store.clone(), Some(generator.clone()))
            .unwrap();
    retriever.sync().await.unwrap();

    let results = retriever.search("pets", 3, None).await.unwrap();

    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(results.stats.variants, 3);
    assert_eq!(store.query_calls(), 3);
    assert_eq!(results.stats.lexical_count, 2);
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn expansion_failure_falls_back_to_original_query() {
    let generator = Arc::new(Paraphraser {
        reply: None,
        calls: AtomicUsize::new(0),
    });
    let store = Arc::new(pets_and_exception());
    let retriever =
        HybridRetriever::new(RetrievalConfig::default(), store.clone(), Some(generator))
            .unwrap();
    retriever.sync().await.unwrap();

    let results = retriever
        .search("Python Exception 0x123", 3, None)
        .await
        .unwrap();

    assert!(results.stats.expansion_failed);
    assert_eq!(results.stats.variants, 1);
    assert_eq!(results.ids[0], "id3");
}

#[tokio::test]
async fn expansion_can_be_disabled_by_config() {
    let generator = Arc::new(Paraphraser {
        reply: Some("dogs".to_string()),
        calls: AtomicUsize::new(0),
    });
    let config = RetrievalConfig {
        enable_expansion: false,
        ..Default::default()
    };
    let retriever =
        HybridRetriever::new(config, Arc::new(pets_and_exception()), Some(generator.clone()))
            .unwrap();
    retriever.sync().await.unwrap();

    retriever.search("pets", 3, None).await.unwrap();
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn contract_violations_are_rejected() {
    let retriever = synced(Arc::new(pets_and_exception()), RetrievalConfig::default()).await;
    assert!(matches!(
        retriever.search("dogs", 0, None).await,
        Err(RetrievalError::InvalidArgument(_))
    ));

    let config = RetrievalConfig {
        mmr_lambda: 2.0,
        ..Default::default()
    };
    assert!(matches!(
        HybridRetriever::new(config, Arc::new(FakeStore::default()), None),
        Err(RetrievalError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn filter_only_query_returns_matching_documents() {
    let store = Arc::new(pets_and_exception());
    let retriever = synced(store.clone(), RetrievalConfig::default()).await;

    let results = retriever.search("type:animal", 3, None).await.unwrap();

    assert_eq!(results.query, "");
    assert_eq!(results.ids, vec!["id1", "id2"]);
    assert_eq!(results.stats.lexical_count, 0);
    assert_eq!(store.query_calls(), 1);
    let seen = store.seen_filters.lock().unwrap();
    assert_eq!(
        seen.last().cloned().flatten(),
        Some([("type".to_string(), "animal".to_string())].into())
    );
}

#[tokio::test]
async fn unsynced_retriever_returns_nothing() {
    let store = Arc::new(pets_and_exception());
    let unsynced = HybridRetriever::new(RetrievalConfig::default(), store, None).unwrap();
    assert_eq!(unsynced.indexed_documents().await, 0);

    let results = unsynced.search("dogs", 3, None).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn vector_lists_of_all_variants_fuse_before_lexical_lists() {
    // "alpha" only hits A lexically, its paraphrase "beta" only hits B through
    // the vector channel. Both sit at rank 0 and tie on fused score.
    let store = Arc::new(FakeStore {
        documents: vec![
            Document::new("A", "alpha release notes"),
            Document::new("B", "gamma changelog"),
        ],
        rankings_by_text: HashMap::from([
            ("alpha".to_string(), Vec::new()),
            ("beta".to_string(), vec!["B".to_string()]),
        ]),
        embeddings: HashMap::from([
            ("A".to_string(), vec![0.0, 1.0, 0.0]),
            ("B".to_string(), vec![0.0, 1.0, 0.0]),
        ]),
        query_embedding: vec![1.0, 0.0, 0.0],
        ..Default::default()
    });
    let generator = Arc::new(Paraphraser {
        reply: Some("beta".to_string()),
        calls: AtomicUsize::new(0),
    });
    let config = RetrievalConfig {
        enable_cache: false,
        ..Default::default()
    };
    let retriever = HybridRetriever::new(config, store, Some(generator)).unwrap();
    retriever.sync().await.unwrap();

    let results = retriever.search("alpha", 2, None).await.unwrap();
    assert_eq!(results.stats.variants, 2);
    assert_eq!(results.ids, vec!["B", "A"]);
}

#[tokio::test]
async fn sync_picks_up_new_documents_and_clears_cache() {
    let store = Arc::new(
        LocalDocumentStore::in_memory(Arc::new(HashEmbedder::default()))
            .await
            .unwrap(),
    );
    store
        .add_documents(vec![
            Document::new("pets", "GET /pets returns a paginated list of pets"),
            Document::new("auth", "Send the API key in the Authorization header"),
        ])
        .await
        .unwrap();

    let retriever = HybridRetriever::new(RetrievalConfig::default(), store.clone(), None).unwrap();
    assert_eq!(retriever.sync().await.unwrap(), 2);

    let results = retriever.search("paginated pets", 1, None).await.unwrap();
    assert_eq!(results.ids, vec!["pets"]);
    assert_eq!(retriever.cache_stats().await.exact_size, 1);

    store
        .add_documents(vec![Document::new(
            "webhooks",
            "Webhook deliveries are retried with exponential backoff",
        )])
        .await
        .unwrap();
    assert_eq!(retriever.sync().await.unwrap(), 3);
    assert_eq!(retriever.cache_stats().await.exact_size, 0);

    let results = retriever.search("webhook retried", 1, None).await.unwrap();
    assert_eq!(results.ids, vec!["webhooks"]);
}

#[tokio::test]
async fn clear_cache_forces_a_fresh_search() {
    let store = Arc::new(pets_and_exception());
    let retriever = synced(store.clone(), RetrievalConfig::default()).await;

    retriever.search("dogs", 2, None).await.unwrap();
    let stats = retriever.cache_stats().await;
    assert_eq!((stats.exact_size, stats.semantic_size), (1, 1));

    retriever.clear_cache().await;
    let results = retriever.search("dogs", 2, None).await.unwrap();
    assert_eq!(results.stats.cache_hit, None);
}
