use crate::config::CacheConfig;
use apidocs_doc_store::Filters;
use apidocs_embeddings::cosine_similarity;
use log::debug;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Lowercased query with whitespace runs collapsed to single spaces
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Cache key: normalized query text plus filter pairs sorted by key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: String,
    filters: Vec<(String, String)>,
}

impl CacheKey {
    pub fn new(query: &str, filters: &Filters) -> Self {
        Self {
            query: normalize_query(query),
            filters: filters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

/// Which tier answered a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheHitKind {
    Exact,
    Semantic,
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub exact_size: usize,
    pub exact_capacity: usize,
    pub semantic_size: usize,
    pub semantic_capacity: usize,
}

struct ExactEntry<V> {
    value: V,
    inserted_at: Instant,
}

struct SemanticEntry<V> {
    key: CacheKey,
    embedding: Vec<f32>,
    value: V,
}

struct Tiers<V> {
    exact: LruCache<CacheKey, ExactEntry<V>>,
    semantic: VecDeque<SemanticEntry<V>>,
}

/// Two-tier result cache.
///
/// The exact tier maps a [`CacheKey`] to a value for a fixed time-to-live,
/// evicting the least recently used entry when full. The semantic tier keeps
/// `(embedding, value)` pairs, oldest evicted first, and answers queries whose
/// embedding is close enough to a stored one under identical filters.
/// Values are opaque to the cache.
pub struct SearchCache<V> {
    tiers: Mutex<Tiers<V>>,
    ttl: Duration,
    semantic_capacity: usize,
    threshold: f32,
}

impl<V: Clone> SearchCache<V> {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.exact_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            tiers: Mutex::new(Tiers {
                exact: LruCache::new(capacity),
                semantic: VecDeque::with_capacity(config.semantic_capacity.min(1024)),
            }),
            ttl: Duration::from_secs(config.exact_ttl_secs),
            semantic_capacity: config.semantic_capacity,
            threshold: config.semantic_threshold,
        }
    }

    /// Exact-tier lookup; refreshes recency, drops the entry if expired
    pub async fn get_exact(&self, key: &CacheKey) -> Option<V> {
        let mut tiers = self.tiers.lock().await;
        match tiers.exact.get(key) {
            None => return None,
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => {}
        }

        debug!("Cache entry for '{}' expired", key.query);
        tiers.exact.pop(key);
        None
    }

    /// Semantic-tier lookup: the most similar stored entry with the same
    /// filters, if its cosine similarity exceeds the threshold.
    pub async fn get_similar(&self, key: &CacheKey, embedding: &[f32]) -> Option<(V, f32)> {
        let tiers = self.tiers.lock().await;

        let mut best: Option<(&SemanticEntry<V>, f32)> = None;
        for entry in tiers.semantic.iter() {
            if entry.key.filters != key.filters {
                continue;
            }
            let similarity = cosine_similarity(embedding, &entry.embedding);
            if best.is_none_or(|(_, best_sim)| similarity > best_sim) {
                best = Some((entry, similarity));
            }
        }

        match best {
            Some((entry, similarity)) if similarity > self.threshold => {
                debug!(
                    "Semantic cache hit: '{}' ~ '{}' ({similarity:.3})",
                    key.query, entry.key.query
                );
                Some((entry.value.clone(), similarity))
            }
            _ => None,
        }
    }

    /// Store `value` in the exact tier and, when an embedding is given, in the
    /// semantic tier
    pub async fn set(&self, key: CacheKey, embedding: Option<Vec<f32>>, value: V) {
        let mut tiers = self.tiers.lock().await;

        if let Some(embedding) = embedding.filter(|_| self.semantic_capacity > 0) {
            while tiers.semantic.len() >= self.semantic_capacity {
                tiers.semantic.pop_front();
            }
            tiers.semantic.push_back(SemanticEntry {
                key: key.clone(),
                embedding,
                value: value.clone(),
            });
        }

        tiers.exact.put(
            key,
            ExactEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every entry from both tiers
    pub async fn clear(&self) {
        let mut tiers = self.tiers.lock().await;
        tiers.exact.clear();
        tiers.semantic.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let tiers = self.tiers.lock().await;
        CacheStats {
            exact_size: tiers.exact.len(),
            exact_capacity: tiers.exact.cap().get(),
            semantic_size: tiers.semantic.len(),
            semantic_capacity: self.semantic_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cache(config: CacheConfig) -> SearchCache<String> {
        SearchCache::new(&config)
    }

    fn key(query: &str) -> CacheKey {
        CacheKey::new(query, &Filters::new())
    }

    fn filtered(query: &str, pairs: &[(&str, &str)]) -> CacheKey {
        let filters: Filters = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CacheKey::new(query, &filters)
    }

    #[test]
    fn test_key_normalization() {
        assert_eq!(key("  Rate   LIMITS "), key("rate limits"));
        assert_ne!(key("rate limits"), filtered("rate limits", &[("type", "guide")]));
        assert_eq!(
            filtered("x", &[("b", "2"), ("a", "1")]),
            filtered("x", &[("a", "1"), ("b", "2")])
        );
    }

    #[tokio::test]
    async fn test_set_then_get_is_exact_hit() {
        let cache = cache(CacheConfig::default());
        cache
            .set(key("auth error"), None, "result".to_string())
            .await;

        assert_eq!(cache.get_exact(&key("Auth  Error")).await, Some("result".to_string()));
        assert_eq!(cache.get_exact(&key("other")).await, None);
    }

    #[tokio::test]
    async fn test_semantic_threshold() {
        let cache = cache(CacheConfig::default());
        cache
            .set(key("stored"), Some(vec![1.0, 0.0, 0.0]), "hit".to_string())
            .await;

        let (value, similarity) = cache
            .get_similar(&key("new"), &[0.98, 0.0, 0.0])
            .await
            .unwrap();
        assert_eq!(value, "hit");
        assert!(similarity > 0.95);

        assert!(cache.get_similar(&key("new"), &[0.0, 1.0, 0.0]).await.is_none());
    }

    #[tokio::test]
    async fn test_semantic_picks_most_similar_entry() {
        let cache = cache(CacheConfig {
            semantic_threshold: 0.5,
            ..Default::default()
        });
        cache
            .set(key("a"), Some(vec![0.8, 0.6]), "a".to_string())
            .await;
        cache
            .set(key("b"), Some(vec![1.0, 0.05]), "b".to_string())
            .await;

        let (value, _) = cache.get_similar(&key("q"), &[1.0, 0.0]).await.unwrap();
        assert_eq!(value, "b");
    }

    #[tokio::test]
    async fn test_semantic_requires_same_filters() {
        let cache = cache(CacheConfig::default());
        cache
            .set(
                filtered("auth", &[("type", "guide")]),
                Some(vec![1.0, 0.0]),
                "guide".to_string(),
            )
            .await;

        assert!(cache.get_similar(&key("auth"), &[1.0, 0.0]).await.is_none());
        assert!(
            cache
                .get_similar(&filtered("login", &[("type", "guide")]), &[1.0, 0.0])
                .await
                .is_some()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exact_entries_expire() {
        let cache = cache(CacheConfig {
            exact_ttl_secs: 60,
            ..Default::default()
        });
        cache.set(key("q"), None, "v".to_string()).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get_exact(&key("q")).await.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get_exact(&key("q")).await.is_none());
        assert_eq!(cache.stats().await.exact_size, 0);
    }

    #[tokio::test]
    async fn test_exact_tier_evicts_least_recently_used() {
        let cache = cache(CacheConfig {
            exact_capacity: 2,
            ..Default::default()
        });
        cache.set(key("a"), None, "a".to_string()).await;
        cache.set(key("b"), None, "b".to_string()).await;
        assert!(cache.get_exact(&key("a")).await.is_some());

        cache.set(key("c"), None, "c".to_string()).await;
        assert!(cache.get_exact(&key("a")).await.is_some());
        assert!(cache.get_exact(&key("b")).await.is_none());
        assert!(cache.get_exact(&key("c")).await.is_some());
    }

    #[tokio::test]
    async fn test_semantic_tier_evicts_oldest() {
        let cache = cache(CacheConfig {
            semantic_capacity: 2,
            ..Default::default()
        });
        cache.set(key("a"), Some(vec![1.0, 0.0]), "a".to_string()).await;
        cache.set(key("b"), Some(vec![0.0, 1.0]), "b".to_string()).await;
        cache.set(key("c"), Some(vec![-1.0, 0.0]), "c".to_string()).await;

        assert_eq!(cache.stats().await.semantic_size, 2);
        assert!(cache.get_similar(&key("q"), &[1.0, 0.0]).await.is_none());
        assert!(cache.get_similar(&key("q"), &[0.0, 1.0]).await.is_some());
    }

    #[tokio::test]
    async fn test_clear_and_stats() {
        let cache = cache(CacheConfig::default());
        cache.set(key("a"), Some(vec![1.0]), "a".to_string()).await;
        cache.set(key("b"), None, "b".to_string()).await;

        assert_eq!(
            cache.stats().await,
            CacheStats {
                exact_size: 2,
                exact_capacity: 1000,
                semantic_size: 1,
                semantic_capacity: 500,
            }
        );

        cache.clear().await;
        let stats = cache.stats().await;
        assert_eq!(stats.exact_size, 0);
        assert_eq!(stats.semantic_size, 0);
    }
}
