//! Local sentence-embedding fallback backed by fastembed.
//!
//! Needs no credentials. The model files are downloaded once into the
//! configured cache directory and inference runs on the CPU.

use std::path::PathBuf;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;

use super::provider::{EmbeddingProvider, ProviderInfo};
use super::{EmbeddingError, EmbeddingResult};
use crate::types::Embedding;

/// Provider name reported in [`ProviderInfo`].
pub const LOCAL_PROVIDER_NAME: &str = "fastembed";

/// Default local model: all-MiniLM-L6-v2, 384 dimensions.
pub const DEFAULT_LOCAL_MODEL: &str = "AllMiniLML6V2";

/// Local embedding provider.
pub struct FastEmbedProvider {
    /// fastembed needs `&mut` for inference.
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Load the default model.
    pub fn new(cache_dir: PathBuf) -> EmbeddingResult<Self> {
        Self::with_model(DEFAULT_LOCAL_MODEL, cache_dir, true)
    }

    /// Load the model named by `model_name` (see [`parse_embedding_model`]).
    pub fn with_model(
        model_name: &str,
        cache_dir: PathBuf,
        show_download_progress: bool,
    ) -> EmbeddingResult<Self> {
        let model = parse_embedding_model(model_name)?;
        let model_name = model_to_string(&model);

        tracing::info!(target: "embedding", "loading local model {model_name}");

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?;

        // Probe once so the reported dimension is what the model actually emits.
        let dimension = text_model
            .embed(vec!["dimension probe"], None)
            .map_err(|e| EmbeddingError::ModelInit(e.to_string()))?
            .into_iter()
            .next()
            .map(|v| v.len())
            .ok_or_else(|| EmbeddingError::ModelInit("model returned no probe vector".into()))?;

        tracing::info!(target: "embedding", "local model ready: {model_name} ({dimension} dims)");

        Ok(Self {
            model: Mutex::new(text_model),
            model_name,
            dimension,
        })
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Embedding>> {
        self.model
            .lock()
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::Provider(e.to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            provider_name: LOCAL_PROVIDER_NAME.to_string(),
            model_identifier: self.model_name.clone(),
            dimension: self.dimension,
        }
    }
}

/// Map a configured model name to a fastembed model.
pub fn parse_embedding_model(name: &str) -> EmbeddingResult<EmbeddingModel> {
    match name {
        "AllMiniLML6V2" | "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            Ok(EmbeddingModel::AllMiniLML6V2)
        }
        "AllMiniLML12V2" | "all-MiniLM-L12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "BGESmallENV15" | "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "BGEBaseENV15" | "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        other => Err(EmbeddingError::UnknownModel(other.to_string())),
    }
}

/// Canonical config name for a supported fastembed model.
pub fn model_to_string(model: &EmbeddingModel) -> String {
    match model {
        EmbeddingModel::AllMiniLML6V2 => "AllMiniLML6V2",
        EmbeddingModel::AllMiniLML12V2 => "AllMiniLML12V2",
        EmbeddingModel::BGESmallENV15 => "BGESmallENV15",
        EmbeddingModel::BGEBaseENV15 => "BGEBaseENV15",
        _ => "unsupported",
    }
    .to_string()
}
