//! The capability interface every embedding backend implements.

use serde::{Deserialize, Serialize};

use super::{EmbeddingError, EmbeddingResult};
use crate::types::Embedding;

/// Identity of the active embedding backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub provider_name: String,
    pub model_identifier: String,
    pub dimension: usize,
}

/// Text-to-vector backend.
///
/// Implementors supply [`embed_batch`](Self::embed_batch); callers go through
/// [`generate`](Self::generate), which owns input validation and the
/// one-vector-per-text guarantee.
pub trait EmbeddingProvider: Send + Sync {
    /// Raw backend call. Inputs are already validated and non-empty.
    fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Embedding>>;

    /// Length of every vector this provider produces.
    fn dimension(&self) -> usize;

    /// Name, model and dimension of this provider.
    fn provider_info(&self) -> ProviderInfo;

    /// Embed `texts`, returning exactly one vector per input in input order.
    ///
    /// An empty slice returns an empty vec without touching the backend.
    /// Blank elements are rejected with [`EmbeddingError::EmptyText`].
    fn generate(&self, texts: &[&str]) -> EmbeddingResult<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(position) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::EmptyText { position });
        }

        let vectors = self.embed_batch(texts)?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::Provider(format!(
                "{} returned {} embeddings for {} inputs",
                self.provider_info().provider_name,
                vectors.len(),
                texts.len()
            )));
        }

        let expected = self.dimension();
        if let Some((position, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != expected)
        {
            return Err(EmbeddingError::Provider(format!(
                "embedding {position} has dimension {}, expected {expected}",
                v.len()
            )));
        }

        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        dimension: usize,
        returned: usize,
        calls: AtomicUsize,
    }

    impl EmbeddingProvider for FixedProvider {
        fn embed_batch(&self, _texts: &[&str]) -> EmbeddingResult<Vec<Embedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![vec![0.5; self.dimension]; self.returned])
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn provider_info(&self) -> ProviderInfo {
            ProviderInfo {
                provider_name: "fixed".to_string(),
                model_identifier: "fixed-v1".to_string(),
                dimension: self.dimension,
            }
        }
    }

    fn provider(returned: usize) -> FixedProvider {
        FixedProvider {
            dimension: 4,
            returned,
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_empty_input_skips_backend() {
        let p = provider(0);
        assert!(p.generate(&[]).unwrap().is_empty());
        assert_eq!(p.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_blank_text_names_position() {
        let p = provider(3);
        let err = p.generate(&["ok", "  ", "fine"]).unwrap_err();
        assert!(matches!(err, EmbeddingError::EmptyText { position: 1 }));
        assert_eq!(p.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_count_mismatch_is_provider_error() {
        let p = provider(1);
        let err = p.generate(&["a", "b"]).unwrap_err();
        assert!(matches!(err, EmbeddingError::Provider(_)));
    }

    #[test]
    fn test_generate_preserves_length_and_dimension() {
        let p = provider(3);
        let out = p.generate(&["a", "b", "c"]).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|v| v.len() == p.dimension()));
    }
}
