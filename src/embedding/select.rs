//! One-shot provider selection.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::local::FastEmbedProvider;
use super::openai::{OpenAiOptions, OpenAiProvider};
use super::provider::EmbeddingProvider;
use super::{EmbeddingError, EmbeddingResult};
use crate::config::EmbeddingConfig;

/// Which backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderChoice {
    /// Cloud provider when a key is configured and the probe succeeds, else local.
    #[default]
    Auto,
    /// Cloud provider only; failing the probe is fatal.
    Openai,
    /// Local model only.
    Local,
}

/// Build the embedding provider for this process.
///
/// Call once at startup and share the returned handle. The selection is not
/// revisited later: a cloud outage after this point surfaces as an error from
/// [`EmbeddingProvider::generate`] rather than a silent switch to the local
/// model, whose vectors live in a different space.
pub fn select_provider(config: &EmbeddingConfig) -> EmbeddingResult<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        ProviderChoice::Local => Arc::new(local_provider(config)?),
        ProviderChoice::Openai => {
            let options = openai_options(config).ok_or_else(|| {
                EmbeddingError::Unavailable("OPENAI_API_KEY is not set".to_string())
            })?;
            Arc::new(OpenAiProvider::connect(options)?)
        }
        ProviderChoice::Auto => match openai_options(config) {
            Some(options) => match OpenAiProvider::connect(options) {
                Ok(provider) => Arc::new(provider),
                Err(e) => {
                    tracing::warn!(
                        target: "embedding",
                        "cloud embeddings unavailable ({e}), falling back to local model"
                    );
                    Arc::new(local_provider(config)?)
                }
            },
            None => {
                tracing::debug!(target: "embedding", "no cloud API key configured, using local model");
                Arc::new(local_provider(config)?)
            }
        },
    };

    let info = provider.provider_info();
    tracing::info!(
        target: "embedding",
        "using {} embeddings: {} ({} dims)",
        info.provider_name,
        info.model_identifier,
        info.dimension
    );
    Ok(provider)
}

fn local_provider(config: &EmbeddingConfig) -> EmbeddingResult<FastEmbedProvider> {
    FastEmbedProvider::with_model(&config.local_model, config.model_cache_dir.clone(), true)
}

fn openai_options(config: &EmbeddingConfig) -> Option<OpenAiOptions> {
    let api_key = config.api_key.as_deref()?.trim();
    if api_key.is_empty() {
        return None;
    }
    Some(OpenAiOptions {
        api_key: api_key.to_string(),
        base_url: config.openai_base_url.clone(),
        model: config.openai_model.clone(),
        dimension: config.openai_dimension,
        timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
    })
}
