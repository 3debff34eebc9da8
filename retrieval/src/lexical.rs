use crate::config::Bm25Params;
use apidocs_doc_store::{Document, Filters};
use log::{debug, warn};
use std::collections::HashMap;

/// Lowercase and split into maximal runs of alphanumeric/underscore characters
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// A document that matched at least one query term
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub id: String,
    pub score: f32,
}

/// In-memory BM25 index over an immutable document snapshot.
///
/// The index doubles as the retriever's registry: documents keep their
/// insertion order and are addressable by id in O(1).
#[derive(Debug, Default)]
pub struct LexicalIndex {
    params: Bm25Params,
    documents: Vec<Document>,
    positions: HashMap<String, usize>,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<usize>,
    avg_doc_len: f32,
    doc_freqs: HashMap<String, usize>,
}

impl LexicalIndex {
    /// Build the index from scratch
    pub fn build(documents: Vec<Document>, params: Bm25Params) -> Self {
        let mut index = Self {
            params,
            ..Default::default()
        };

        for doc in documents {
            if index.positions.contains_key(&doc.id) {
                warn!("Duplicate document id '{}' in corpus, keeping first", doc.id);
                continue;
            }

            let tokens = tokenize(&doc.content);
            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens.iter() {
                *freqs.entry(token.clone()).or_default() += 1;
            }
            for term in freqs.keys() {
                *index.doc_freqs.entry(term.clone()).or_default() += 1;
            }

            index.positions.insert(doc.id.clone(), index.documents.len());
            index.doc_lens.push(tokens.len());
            index.term_freqs.push(freqs);
            index.documents.push(doc);
        }

        let total: usize = index.doc_lens.iter().sum();
        if !index.documents.is_empty() {
            index.avg_doc_len = total as f32 / index.documents.len() as f32;
        }

        debug!(
            "Lexical index built: {} documents, {} terms",
            index.documents.len(),
            index.doc_freqs.len()
        );
        index
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Look a document up by id
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.positions.get(id).map(|&pos| &self.documents[pos])
    }

    /// Documents in registry order
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.documents.len() as f32;
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// BM25 score of every document, in registry order.
    ///
    /// Repeated query tokens count once per occurrence. Documents sharing no
    /// term with the query score exactly 0.
    pub fn score_all(&self, query_tokens: &[String]) -> Vec<f32> {
        let mut scores = vec![0.0; self.documents.len()];
        let Bm25Params { k1, b } = self.params;

        for term in query_tokens {
            if !self.doc_freqs.contains_key(term) {
                continue;
            }
            let idf = self.idf(term);

            for (pos, freqs) in self.term_freqs.iter().enumerate() {
                let Some(&tf) = freqs.get(term) else {
                    continue;
                };
                let tf = tf as f32;
                let len_norm = 1.0 - b + b * self.doc_lens[pos] as f32 / self.avg_doc_len;
                scores[pos] += idf * tf * (k1 + 1.0) / (tf + k1 * len_norm);
            }
        }

        scores
    }

    /// Top `k` matching documents for `query`, best first.
    ///
    /// Only documents with a positive score that satisfy `filters` are
    /// considered; equal scores keep registry order.
    pub fn search(&self, query: &str, k: usize, filters: Option<&Filters>) -> Vec<LexicalHit> {
        let tokens = tokenize(query);
        if tokens.is_empty() || k == 0 {
            return Vec::new();
        }

        let scores = self.score_all(&tokens);
        // Filters apply before the `k` cutoff: a filtered query still gets up
        // to `k` hits even when higher-scoring documents fail the filters.
        let mut ranked: Vec<(usize, f32)> = scores
            .into_iter()
            .enumerate()
            .filter(|&(_, score)| score > 0.0)
            .filter(|&(pos, _)| {
                filters.is_none_or(|f| f.is_empty() || self.documents[pos].matches_filters(f))
            })
            .collect();

        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(k);

        ranked
            .into_iter()
            .map(|(pos, score)| LexicalHit {
                id: self.documents[pos].id.clone(),
                score,
            })
            .collect()
    }
}
