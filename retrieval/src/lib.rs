/*!
# API Docs Retrieval

Hybrid retrieval of API-documentation snippets combining:
- **BM25 lexical ranking** over an in-memory index rebuilt on sync
- **Vector similarity search** delegated to the document store
- **Query expansion** through an optional text generator
- **Reciprocal Rank Fusion (RRF)** across variants and channels
- **Maximum Marginal Relevance (MMR)** to trade relevance for diversity
- **Two-tier caching**: exact (normalized query + filters, TTL/LRU) and
  semantic (embedding similarity)

## Architecture

```text
Query
  ├─> Filter parse (`key:value` tokens)
  ├─> Cache (exact, then semantic)
  └─> Expansion ──> [original, variation...]
        └─> per variant
              ├─> Vector search (store, filter-aware)
              └─> BM25 search (post-filtered)
                    └─> RRF fusion ──> top n*3 ids
                          └─> Embedding fetch ──> MMR ──> top n
```

## Example

```rust,no_run
use apidocs_doc_store::{Document, LocalDocumentStore};
use apidocs_embeddings::HashEmbedder;
use apidocs_retrieval::{HybridRetriever, RetrievalConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(LocalDocumentStore::in_memory(Arc::new(HashEmbedder::default())).await?);
    store
        .add_documents(vec![
            Document::new("auth-1", "Send the API key in the Authorization header")
                .with_meta("type", "guide"),
        ])
        .await?;

    let retriever = HybridRetriever::new(RetrievalConfig::default(), store, None)?;
    retriever.sync().await?;

    let results = retriever.search("authorization header type:guide", 5, None).await?;
    for (i, (id, content)) in results.iter().enumerate() {
        println!("{}. [{id}] {content}", i + 1);
    }

    Ok(())
}
```
*/

mod cache;
mod config;
mod error;
mod expansion;
mod filter;
mod fusion;
mod lexical;
mod mmr;
mod result;
mod retrieval;

pub use cache::{CacheHitKind, CacheKey, CacheStats, SearchCache, normalize_query};
pub use config::{Bm25Params, CacheConfig, RetrievalConfig};
pub use error::{Result, RetrievalError};
pub use expansion::{Expansion, QueryExpander, parse_variations};
pub use filter::{ParsedQuery, parse_query};
pub use fusion::{FusedId, FusionEngine, FusionTable};
pub use lexical::{LexicalHit, LexicalIndex, tokenize};
pub use mmr::{Candidate, diversify};
pub use result::{SearchResults, SearchStats};
pub use retrieval::HybridRetriever;
