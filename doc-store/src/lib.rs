//! # API Docs Document Store
//!
//! Storage for documentation snippets and their embeddings.
//!
//! [`DocumentStore`] is the contract the retrieval core consumes: ranked
//! similarity queries with optional metadata filters, full listing (used to
//! rebuild the lexical index), batched embedding lookup and text embedding.
//!
//! [`LocalDocumentStore`] implements it in-process with exact cosine search and
//! optional JSON persistence.
//!
//! ## Example
//!
//! ```no_run
//! use apidocs_doc_store::{Document, DocumentStore, LocalDocumentStore};
//! use apidocs_embeddings::HashEmbedder;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = LocalDocumentStore::in_memory(Arc::new(HashEmbedder::default())).await?;
//!     store
//!         .add_documents(vec![Document::new("pets-1", "GET /pets lists pets")])
//!         .await?;
//!
//!     let hits = store.query("list pets", 5, None).await?;
//!     println!("Found {} snippets", hits.len());
//!     Ok(())
//! }
//! ```

mod document;
mod error;
mod local;
mod store;

pub use document::{Document, Filters, Metadata, StoreHit, metadata_matches};
pub use error::StoreError;
pub use local::{LocalDocumentStore, StoreConfig};
pub use store::DocumentStore;
