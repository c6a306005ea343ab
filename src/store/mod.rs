//! Vector store layer: the [`VectorIndex`] seam, its Pinecone and in-memory
//! implementations, and the [`VectorStoreManager`] on top.

mod error;
mod index;
mod manager;
mod memory;
mod pinecone;

pub use error::{StoreError, StoreResult};
pub use index::{IndexDescription, Metric, ScoredRecord, VectorIndex};
pub use manager::{BatchFailure, UpsertReport, VectorStoreManager};
pub use memory::{InMemoryIndex, UpsertCall, cosine_similarity};
pub use pinecone::{PineconeIndex, PineconeOptions, serverless_location};

use std::sync::Arc;
use std::time::Duration;

use crate::config::{StoreBackend, StoreConfig};

/// Build the index handle the configuration asks for.
///
/// The Pinecone backend checks its credentials first and fails with a
/// configuration error naming the missing variable.
pub fn open_index(config: &StoreConfig) -> StoreResult<Arc<dyn VectorIndex>> {
    match config.backend {
        StoreBackend::Pinecone => {
            let credentials = config.require_credentials()?;
            let index = PineconeIndex::new(PineconeOptions {
                api_key: credentials.api_key,
                environment: credentials.environment,
                index_name: credentials.index_name,
                controller_url: config.controller_url.clone(),
                timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
                ready_timeout: Duration::from_secs(config.index_ready_timeout_secs),
            })?;
            Ok(Arc::new(index))
        }
        StoreBackend::Memory => {
            let name = config
                .index_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "docqa-memory".to_string());
            tracing::debug!(target: "store", "using in-memory index {name}");
            Ok(Arc::new(InMemoryIndex::new(name)))
        }
    }
}
