//! Memoizing front for an [`EmbeddingProvider`].
//!
//! Entries are keyed by the SHA-256 digest of the exact text and held in a
//! bounded LRU. All misses of one call go to the provider in a single batch.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use super::provider::EmbeddingProvider;
use super::{EmbeddingError, EmbeddingResult};
use crate::types::Embedding;

/// Default number of cached vectors.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

type ContentKey = [u8; 32];

/// Hit/miss counters since construction (or the last [`EmbeddingCache::clear`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

struct CacheState {
    entries: LruCache<ContentKey, Embedding>,
    hits: usize,
    misses: usize,
}

/// Text → vector cache in front of one provider.
pub struct EmbeddingCache {
    provider: Arc<dyn EmbeddingProvider>,
    state: Mutex<CacheState>,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` vectors (minimum 1).
    pub fn new(provider: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            provider,
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// The provider answering cache misses.
    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Return one vector per text, computing only the texts not yet cached.
    ///
    /// Misses are deduplicated and embedded in one provider call. If that call
    /// fails the cache is left exactly as it was, so retrying is safe.
    pub fn get_or_compute(&self, texts: &[&str]) -> EmbeddingResult<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(position) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::EmptyText { position });
        }

        let keys: Vec<ContentKey> = texts.iter().map(|t| content_key(t)).collect();
        let mut results: Vec<Option<Embedding>> = vec![None; texts.len()];

        // Distinct missing texts in first-seen order, and every position waiting on each.
        let mut pending: Vec<(ContentKey, &str)> = Vec::new();
        let mut waiting: HashMap<ContentKey, Vec<usize>> = HashMap::new();
        {
            let mut state = self.state.lock();
            for (position, key) in keys.iter().enumerate() {
                if let Some(vector) = state.entries.get(key) {
                    results[position] = Some(vector.clone());
                    state.hits += 1;
                    continue;
                }
                state.misses += 1;
                let slots = waiting.entry(*key).or_default();
                if slots.is_empty() {
                    pending.push((*key, texts[position]));
                }
                slots.push(position);
            }
        }

        if !pending.is_empty() {
            tracing::debug!(
                target: "cache",
                "{} of {} texts missing, embedding {} distinct",
                texts.len() - results.iter().filter(|r| r.is_some()).count(),
                texts.len(),
                pending.len()
            );

            // Lock released: the provider call may block for a long time.
            let batch: Vec<&str> = pending.iter().map(|(_, text)| *text).collect();
            let vectors = self.provider.generate(&batch)?;

            let mut state = self.state.lock();
            for ((key, _), vector) in pending.iter().zip(vectors) {
                if let Some(slots) = waiting.get(key) {
                    for &position in slots {
                        results[position] = Some(vector.clone());
                    }
                }
                state.entries.put(*key, vector);
            }
        }

        results
            .into_iter()
            .enumerate()
            .map(|(position, slot)| {
                slot.ok_or_else(|| {
                    EmbeddingError::Provider(format!("no embedding produced for input {position}"))
                })
            })
            .collect()
    }

    /// Embed a single text through the cache.
    pub fn get_or_compute_one(&self, text: &str) -> EmbeddingResult<Embedding> {
        self.get_or_compute(&[text])?
            .pop()
            .ok_or_else(|| EmbeddingError::Provider("no embedding produced".into()))
    }

    /// True when `text` has a cached vector. Does not touch LRU order.
    pub fn contains(&self, text: &str) -> bool {
        self.state.lock().entries.contains(&content_key(text))
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached vectors and reset the counters.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.hits = 0;
        state.misses = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
        }
    }
}

fn content_key(text: &str) -> ContentKey {
    Sha256::digest(text.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::ProviderInfo;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Encodes text length and first byte; counts backend calls and inputs.
    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
        inputs: AtomicUsize,
        fail: AtomicBool,
    }

    impl EmbeddingProvider for CountingProvider {
        fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Embedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inputs.fetch_add(texts.len(), Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(EmbeddingError::Provider("backend down".into()));
            }
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, t.as_bytes()[0] as f32])
                .collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn provider_info(&self) -> ProviderInfo {
            ProviderInfo {
                provider_name: "counting".into(),
                model_identifier: "counting".into(),
                dimension: 2,
            }
        }
    }

    fn setup(capacity: usize) -> (Arc<CountingProvider>, EmbeddingCache) {
        let provider = Arc::new(CountingProvider::default());
        let cache = EmbeddingCache::new(provider.clone(), capacity);
        (provider, cache)
    }

    #[test]
    fn test_cached_text_does_not_call_provider_again() {
        let (provider, cache) = setup(16);

        let first = cache.get_or_compute_one("hello").unwrap();
        let second = cache.get_or_compute_one("hello").unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_misses_batched_into_one_call_and_scattered_back() {
        let (provider, cache) = setup(16);
        cache.get_or_compute_one("bb").unwrap();

        let out = cache
            .get_or_compute(&["a", "bb", "ccc", "a", "bb"])
            .unwrap();

        assert_eq!(out[0], vec![1.0, b'a' as f32]);
        assert_eq!(out[1], vec![2.0, b'b' as f32]);
        assert_eq!(out[2], vec![3.0, b'c' as f32]);
        assert_eq!(out[3], out[0]);
        assert_eq!(out[4], out[1]);
        // one call for the warm-up, one for {"a", "ccc"}
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(provider.inputs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failure_leaves_cache_unmodified() {
        let (provider, cache) = setup(16);
        cache.get_or_compute_one("kept").unwrap();

        provider.fail.store(true, Ordering::SeqCst);
        assert!(cache.get_or_compute(&["kept", "new"]).is_err());
        assert_eq!(cache.len(), 1);
        assert!(!cache.contains("new"));

        provider.fail.store(false, Ordering::SeqCst);
        let out = cache.get_or_compute(&["kept", "new"]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let (provider, cache) = setup(2);
        cache.get_or_compute_one("one").unwrap();
        cache.get_or_compute_one("two").unwrap();
        cache.get_or_compute_one("one").unwrap();
        cache.get_or_compute_one("three").unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("one"));
        assert!(!cache.contains("two"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_blank_text_rejected_before_lookup() {
        let (provider, cache) = setup(4);
        let err = cache.get_or_compute(&["fine", ""]).unwrap_err();
        assert!(matches!(err, EmbeddingError::EmptyText { position: 1 }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
