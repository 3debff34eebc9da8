use apidocs_doc_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid retrieval config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
