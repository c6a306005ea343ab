//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod ingest;
pub mod init;
pub mod migrate;
pub mod namespace;
pub mod query;

use std::sync::Arc;

use anyhow::Context;

use crate::config::Settings;
use crate::embedding::{EmbeddingProvider, select_provider};
use crate::store::{VectorStoreManager, open_index};

/// Open the configured index, pick the embedding provider and connect them.
///
/// Credentials are checked before any network call is made.
pub(crate) fn connect_store(
    settings: &Settings,
) -> anyhow::Result<(Arc<dyn EmbeddingProvider>, VectorStoreManager)> {
    let index = open_index(&settings.store)?;
    let provider = select_provider(&settings.embedding).context("No embedding provider available")?;
    let manager = VectorStoreManager::connect(index, provider.clone(), &settings.store)
        .context("Failed to connect to the vector index")?;
    tracing::info!(
        target: "cli",
        "connected to index {} ({} dims)",
        manager.index_name(),
        manager.dimension()
    );
    Ok((provider, manager))
}
