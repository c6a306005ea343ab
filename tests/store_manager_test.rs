//! Vector store manager behaviour against the in-memory index.

mod common;

use std::sync::Arc;

use common::{KeywordProvider, memory_manager};
use docqa::{DocumentChunk, StoreError, VectorIndex, VectorRecord};

fn faq_chunks() -> Vec<DocumentChunk> {
    vec![
        DocumentChunk::new("Patents protect inventions.", "faq.pdf", 0, "test"),
        DocumentChunk::new("BIS sets quality standards.", "faq.pdf", 1, "test"),
    ]
}

#[test]
fn test_query_returns_best_matching_chunk() {
    let provider = Arc::new(KeywordProvider::new());
    let (_index, manager) = memory_manager(provider, 100);

    let report = manager.upsert_chunks(&faq_chunks()).unwrap();
    assert_eq!(report.submitted, 2);

    let matches = manager.query("test", "What protects inventions?", 1).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].content, "Patents protect inventions.");
    assert_eq!(matches[0].source, "faq.pdf");
    assert_eq!(matches[0].chunk_index, 0);

    let all = manager.query("test", "What protects inventions?", 5).unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].score > all[1].score);
}

#[test]
fn test_reupsert_overwrites_instead_of_duplicating() {
    let provider = Arc::new(KeywordProvider::new());
    let (index, manager) = memory_manager(provider, 100);

    manager.upsert_chunks(&faq_chunks()).unwrap();
    manager.upsert_chunks(&faq_chunks()).unwrap();

    assert_eq!(index.namespace_count("test").unwrap(), 2);
    assert_eq!(manager.query("test", "patents quality", 10).unwrap().len(), 2);
    assert!(index.get("test", "test_faq.pdf_0").is_some());
}

#[test]
fn test_large_upsert_is_split_into_ordered_batches() {
    let provider = Arc::new(KeywordProvider::new());
    let (index, manager) = memory_manager(provider, 100);

    let chunks: Vec<DocumentChunk> = (0..150)
        .map(|i| DocumentChunk::new(format!("Patent chunk number {i}"), "doc.pdf", i, "test"))
        .collect();
    let report = manager.upsert_chunks(&chunks).unwrap();

    assert_eq!(report.batches, 2);
    assert_eq!(report.submitted, 150);

    let calls = index.upsert_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].ids.len(), 100);
    assert_eq!(calls[1].ids.len(), 50);
    assert_eq!(calls[0].ids[0], "test_doc.pdf_0");
    assert_eq!(calls[0].ids[99], "test_doc.pdf_99");
    assert_eq!(calls[1].ids[0], "test_doc.pdf_100");
    assert_eq!(calls[1].ids[49], "test_doc.pdf_149");
}

#[test]
fn test_wrong_dimension_leaves_index_unchanged() {
    let provider = Arc::new(KeywordProvider::new());
    let (index, manager) = memory_manager(provider, 100);
    manager.upsert_chunks(&faq_chunks()).unwrap();
    let before = index.get("test", "test_faq.pdf_0").unwrap();

    let chunk = DocumentChunk::new("Replacement text.", "faq.pdf", 0, "test");
    let record = VectorRecord::from_chunk("test", &chunk, vec![1.0; 3]);
    let err = manager.upsert_records("test", vec![record]).unwrap_err();

    assert!(matches!(err, StoreError::DimensionMismatch { actual: 3, .. }));
    assert_eq!(index.get("test", "test_faq.pdf_0").unwrap(), before);
    assert_eq!(index.namespace_count("test").unwrap(), 2);
    assert_eq!(index.upsert_calls().len(), 1);
}

#[test]
fn test_cached_texts_do_not_reach_provider() {
    let provider = Arc::new(KeywordProvider::new());
    let (_index, manager) = memory_manager(provider.clone(), 100);

    manager.upsert_chunks(&faq_chunks()).unwrap();
    assert_eq!(provider.calls(), 1);
    assert_eq!(provider.texts_embedded(), 2);

    manager.upsert_chunks(&faq_chunks()).unwrap();
    manager.query("test", "Patents protect inventions.", 1).unwrap();
    assert_eq!(provider.calls(), 1);

    manager.query("test", "quality", 1).unwrap();
    assert_eq!(provider.calls(), 2);
    assert_eq!(manager.cache().stats().hits, 3);
}

#[test]
fn test_namespaces_are_isolated() {
    let provider = Arc::new(KeywordProvider::new());
    let (index, manager) = memory_manager(provider, 100);

    let mut chunks = faq_chunks();
    chunks.push(DocumentChunk::new("Patents in another collection.", "other.pdf", 0, "other"));
    manager.upsert_chunks(&chunks).unwrap();

    assert_eq!(index.namespace_count("test").unwrap(), 2);
    assert_eq!(index.namespace_count("other").unwrap(), 1);
    assert!(manager.query("missing", "patents", 3).unwrap().is_empty());

    manager.delete_namespace("other").unwrap();
    assert_eq!(manager.namespace_count("other").unwrap(), 0);
    assert_eq!(manager.namespace_count("test").unwrap(), 2);
}

#[test]
fn test_failed_embedding_counts_without_aborting() {
    let provider = Arc::new(KeywordProvider::failing_on("poison"));
    let (index, manager) = memory_manager(provider, 100);

    let mut chunks = faq_chunks();
    chunks.push(DocumentChunk::new("A poison chunk.", "faq.pdf", 2, "test"));
    let report = manager.upsert_chunks(&chunks).unwrap();

    assert_eq!(report.submitted, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(index.namespace_count("test").unwrap(), 2);
}
