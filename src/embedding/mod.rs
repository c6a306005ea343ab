//! Embedding providers, provider selection and the embedding cache.
//!
//! Two backends sit behind [`EmbeddingProvider`]: a cloud endpoint
//! ([`OpenAiProvider`], 1536 dims) and a local model ([`FastEmbedProvider`],
//! 384 dims). [`select_provider`] picks one at startup and the choice is
//! final for the life of the process.

mod cache;
mod local;
mod openai;
mod provider;
mod select;

pub use cache::{CacheStats, DEFAULT_CACHE_CAPACITY, EmbeddingCache};
pub use local::{
    DEFAULT_LOCAL_MODEL, FastEmbedProvider, LOCAL_PROVIDER_NAME, model_to_string,
    parse_embedding_model,
};
pub use openai::{OPENAI_PROVIDER_NAME, OpenAiOptions, OpenAiProvider};
pub use provider::{EmbeddingProvider, ProviderInfo};
pub use select::{ProviderChoice, select_provider};

use thiserror::Error;

/// Errors from embedding generation.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// An input text was empty or whitespace-only.
    #[error("input text at position {position} is empty")]
    EmptyText { position: usize },

    /// The active backend failed while embedding.
    #[error("embedding provider error: {0}")]
    Provider(String),

    /// A backend could not be reached or failed its startup probe.
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    #[error("failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("unknown embedding model: {0}")]
    UnknownModel(String),
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
