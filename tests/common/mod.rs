//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod http_stub;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use docqa::config::StoreConfig;
use docqa::embedding::{EmbeddingError, EmbeddingResult, ProviderInfo};
use docqa::{Embedding, EmbeddingProvider, InMemoryIndex, VectorStoreManager};

/// Word stems, one vector dimension each.
pub const VOCABULARY: [&str; 15] = [
    "patent",
    "protect",
    "invent",
    "standard",
    "quality",
    "bis",
    "artificial",
    "intelligence",
    "machine",
    "learn",
    "data",
    "process",
    "business",
    "document",
    "analysis",
];

/// Deterministic bag-of-stems embedder.
///
/// Each word adds 1.0 to the dimension of the first stem it starts with, so
/// texts sharing words score high under cosine similarity.
pub struct KeywordProvider {
    calls: AtomicUsize,
    texts_embedded: AtomicUsize,
    fail_on: Option<String>,
}

impl KeywordProvider {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
            fail_on: None,
        }
    }

    /// A provider whose calls fail whenever any input contains `word`.
    pub fn failing_on(word: &str) -> Self {
        Self {
            fail_on: Some(word.to_lowercase()),
            ..Self::new()
        }
    }

    /// Backend calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Texts sent to the backend so far.
    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    fn embed_one(text: &str) -> Embedding {
        let mut vector = vec![0.0; VOCABULARY.len()];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            if let Some(dim) = VOCABULARY.iter().position(|stem| word.starts_with(stem)) {
                vector[dim] += 1.0;
            }
        }
        vector
    }
}

impl EmbeddingProvider for KeywordProvider {
    fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(word) = &self.fail_on {
            if texts.iter().any(|t| t.to_lowercase().contains(word.as_str())) {
                return Err(EmbeddingError::Provider(format!("refusing '{word}'")));
            }
        }
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        VOCABULARY.len()
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            provider_name: "keyword".to_string(),
            model_identifier: "bag-of-stems".to_string(),
            dimension: VOCABULARY.len(),
        }
    }
}

/// Store settings with no inter-batch pause.
pub fn fast_store_config(batch_size: usize) -> StoreConfig {
    StoreConfig {
        upsert_batch_size: batch_size,
        batch_pause_ms: 0,
        ..StoreConfig::default()
    }
}

/// A manager over a fresh in-memory index.
pub fn memory_manager(
    provider: Arc<KeywordProvider>,
    batch_size: usize,
) -> (Arc<InMemoryIndex>, VectorStoreManager) {
    let index = Arc::new(InMemoryIndex::new("test-index"));
    let manager = VectorStoreManager::connect(index.clone(), provider, &fast_store_config(batch_size))
        .expect("connect to in-memory index");
    (index, manager)
}

pub fn write_pickle<T: serde::Serialize>(path: &Path, value: &T) {
    let mut file = std::fs::File::create(path).expect("create pickle");
    serde_pickle::to_writer(&mut file, value, serde_pickle::SerOptions::new()).expect("write pickle");
}

/// A `chroma.sqlite3` with one generic `documents` table holding `texts`.
pub fn write_catalog(path: &Path, texts: &[&str]) {
    let conn = rusqlite::Connection::open(path).expect("create catalog");
    conn.execute_batch("CREATE TABLE documents (id INTEGER PRIMARY KEY, document TEXT)")
        .expect("create table");
    for text in texts {
        conn.execute("INSERT INTO documents (document) VALUES (?1)", [text])
            .expect("insert row");
    }
}
