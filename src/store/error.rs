use thiserror::Error;

use crate::config::ConfigError;
use crate::embedding::EmbeddingError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(
        "Index '{index}' has dimension {expected} but vectors have dimension {actual}. \
         Delete or recreate the index, or point PINECONE_INDEX_NAME at another one"
    )]
    DimensionMismatch {
        index: String,
        expected: usize,
        actual: usize,
    },

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index '{0}' did not become ready within {1}s")]
    IndexNotReady(String, u64),

    #[error("Request to vector service failed: {0}")]
    Transport(String),

    #[error("Vector service error: {0}")]
    Service(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type StoreResult<T> = Result<T, StoreError>;
