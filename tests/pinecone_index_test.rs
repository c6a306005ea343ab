//! `PineconeIndex` driven through the manager against a loopback stand-in
//! for the Pinecone control and data planes.

mod common;

use std::sync::Arc;

use common::KeywordProvider;
use common::http_stub::StubServer;
use docqa::config::{StoreBackend, StoreConfig};
use docqa::store::{StoreResult, open_index};
use docqa::{DocumentChunk, StoreError, VectorStoreManager};
use serde_json::{Value, json};

const INDEX: &str = "docqa-test";
const DESCRIBE: &str = "/indexes/docqa-test";

fn pinecone_config(server: &StubServer, ready_timeout_secs: u64) -> StoreConfig {
    StoreConfig {
        backend: StoreBackend::Pinecone,
        api_key: Some("pk-test".to_string()),
        environment: Some("us-east-1-aws".to_string()),
        index_name: Some(INDEX.to_string()),
        controller_url: server.url().to_string(),
        upsert_batch_size: 2,
        batch_pause_ms: 0,
        request_timeout_secs: 5,
        index_ready_timeout_secs: ready_timeout_secs,
        ..StoreConfig::default()
    }
}

fn connect(config: &StoreConfig) -> StoreResult<VectorStoreManager> {
    let index = open_index(config)?;
    VectorStoreManager::connect(index, Arc::new(KeywordProvider::new()), config)
}

/// Describe-index body for an index served by the stub itself.
fn index_model(host: &str, dimension: usize, ready: bool) -> Value {
    json!({
        "name": INDEX,
        "dimension": dimension,
        "metric": "cosine",
        "host": host,
        "status": { "ready": ready, "state": if ready { "Ready" } else { "Initializing" } }
    })
}

fn not_found() -> (u16, Value) {
    (404, json!({ "error": { "code": "NOT_FOUND", "message": "Resource not found" } }))
}

/// A server whose index already exists with `dimension` and answers `data_plane`
/// for every other request.
fn existing_index<F>(dimension: usize, mut data_plane: F) -> StubServer
where
    F: FnMut(&common::http_stub::RecordedRequest) -> (u16, Value) + Send + 'static,
{
    StubServer::start(move |request, base| {
        if request.is("GET", DESCRIBE) {
            (200, index_model(base, dimension, true))
        } else {
            data_plane(request)
        }
    })
}

fn faq_chunks() -> Vec<DocumentChunk> {
    vec![
        DocumentChunk::new("Patents protect inventions.", "uploads/faq.pdf", 0, "faq"),
        DocumentChunk::new("BIS sets quality standards.", "uploads/faq.pdf", 1, "faq"),
        DocumentChunk::new("Machine learning needs data.", "uploads/faq.pdf", 2, "faq"),
    ]
}

#[test]
fn test_connect_creates_missing_index_and_waits_until_ready() {
    let mut created = false;
    let mut describes_after_create = 0;
    let server = StubServer::start(move |request, base| {
        if request.is("GET", DESCRIBE) {
            if !created {
                return not_found();
            }
            describes_after_create += 1;
            (200, index_model(base, 15, describes_after_create > 1))
        } else if request.is("POST", "/indexes") {
            created = true;
            (201, index_model("", 15, false))
        } else if request.is("POST", "/vectors/upsert") {
            let count = request.body["vectors"].as_array().map_or(0, Vec::len);
            (200, json!({ "upsertedCount": count }))
        } else {
            not_found()
        }
    });
    let config = pinecone_config(&server, 30);

    let manager = connect(&config).unwrap();
    assert_eq!(manager.index_name(), INDEX);
    assert_eq!(manager.dimension(), 15);

    let creates = server.requests_to("POST", "/indexes");
    assert_eq!(creates.len(), 1);
    let create = &creates[0];
    assert_eq!(create.body["name"], INDEX);
    assert_eq!(create.body["dimension"], 15);
    assert_eq!(create.body["metric"], "cosine");
    assert_eq!(create.body["spec"]["serverless"]["cloud"], "aws");
    assert_eq!(create.body["spec"]["serverless"]["region"], "us-east-1");
    assert_eq!(create.header("Api-Key"), Some("pk-test"));
    assert_eq!(create.header("X-Pinecone-API-Version"), Some("2024-07"));
    // 404, then one not-ready poll, then ready.
    assert_eq!(server.requests_to("GET", DESCRIBE).len(), 3);

    let report = manager.upsert_chunks(&faq_chunks()).unwrap();
    assert_eq!(report.submitted, 3);
    assert_eq!(report.batches, 2);

    let upserts = server.requests_to("POST", "/vectors/upsert");
    let sizes: Vec<usize> = upserts
        .iter()
        .map(|r| r.body["vectors"].as_array().map_or(0, Vec::len))
        .collect();
    assert_eq!(sizes, vec![2, 1]);
    assert!(upserts.iter().all(|r| r.body["namespace"] == "faq"));
    assert_eq!(upserts[0].body["vectors"][0]["id"], "faq_faq.pdf_0");
    assert_eq!(upserts[0].body["vectors"][0]["metadata"]["source"], "uploads/faq.pdf");
    assert_eq!(upserts[1].body["vectors"][0]["metadata"]["chunk_index"], 2);
}

#[test]
fn test_index_that_never_becomes_ready_fails_connect() {
    let mut created = false;
    let server = StubServer::start(move |request, base| {
        if request.is("POST", "/indexes") {
            created = true;
            (201, index_model("", 15, false))
        } else if request.is("GET", DESCRIBE) && created {
            (200, index_model(base, 15, false))
        } else {
            not_found()
        }
    });

    let err = connect(&pinecone_config(&server, 0)).err().unwrap();
    assert!(matches!(err, StoreError::IndexNotReady(ref name, 0) if name == INDEX));
}

#[test]
fn test_existing_index_with_other_dimension_is_left_alone() {
    let server = existing_index(1536, |_| not_found());

    let err = connect(&pinecone_config(&server, 30)).err().unwrap();
    assert!(matches!(
        err,
        StoreError::DimensionMismatch { expected: 1536, actual: 15, .. }
    ));
    assert!(server.requests_to("POST", "/indexes").is_empty());
}

#[test]
fn test_query_parses_matches_best_first() {
    let server = existing_index(15, |request| {
        if !request.is("POST", "/query") {
            return not_found();
        }
        (
            200,
            json!({
                "namespace": "faq",
                "matches": [
                    {
                        "id": "faq_faq.pdf_1",
                        "score": 0.41,
                        "metadata": { "content": "BIS sets quality standards.", "source": "uploads/faq.pdf", "chunk_index": 1 }
                    },
                    {
                        "id": "legacy_old.pdf_4",
                        "score": 0.93,
                        "metadata": { "page_content": "Patents protect inventions.", "source": "old.pdf", "chunk_id": "4" }
                    },
                    { "id": "no-metadata", "score": 0.99 }
                ]
            }),
        )
    });
    let manager = connect(&pinecone_config(&server, 30)).unwrap();

    let matches = manager.query("faq", "How do patents protect inventions?", 3).unwrap();

    let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["legacy_old.pdf_4", "faq_faq.pdf_1"]);
    assert_eq!(matches[0].content, "Patents protect inventions.");
    assert_eq!(matches[0].source, "old.pdf");
    assert_eq!(matches[0].chunk_index, 4);
    assert!((matches[0].score - 0.93).abs() < 1e-6);

    let queries = server.requests_to("POST", "/query");
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].body["namespace"], "faq");
    assert_eq!(queries[0].body["topK"], 3);
    assert_eq!(queries[0].body["includeMetadata"], true);
    assert_eq!(queries[0].body["vector"].as_array().map(Vec::len), Some(15));
}

#[test]
fn test_rejected_batch_is_counted_and_later_batches_still_sent() {
    let mut upserts = 0;
    let server = existing_index(15, move |request| {
        if !request.is("POST", "/vectors/upsert") {
            return not_found();
        }
        upserts += 1;
        if upserts == 1 {
            return (400, json!({ "error": { "code": "INVALID_ARGUMENT", "message": "Metadata size exceeds limit" } }));
        }
        let count = request.body["vectors"].as_array().map_or(0, Vec::len);
        (200, json!({ "upsertedCount": count }))
    });
    let manager = connect(&pinecone_config(&server, 30)).unwrap();

    let report = manager.upsert_chunks(&faq_chunks()).unwrap();

    assert_eq!(report.batches, 2);
    assert_eq!(report.submitted, 1);
    assert_eq!(report.failed, 2);
    assert_eq!(report.failed_batches.len(), 1);
    assert_eq!(report.failed_batches[0].first_id, "faq_faq.pdf_0");
    assert!(report.failed_batches[0].reason.contains("Metadata size exceeds limit"));
}

#[test]
fn test_delete_of_missing_namespace_succeeds() {
    let server = existing_index(15, |request| {
        if !request.is("POST", "/vectors/delete") {
            return not_found();
        }
        match request.body["namespace"].as_str() {
            Some("ghost") => not_found(),
            Some("broken") => (500, json!({ "error": "internal" })),
            _ => (200, json!({})),
        }
    });
    let manager = connect(&pinecone_config(&server, 30)).unwrap();

    manager.delete_namespace("ghost").unwrap();
    manager.delete_namespace("faq").unwrap();
    let err = manager.delete_namespace("broken").unwrap_err();
    assert!(matches!(err, StoreError::Service(_)));

    let deletes = server.requests_to("POST", "/vectors/delete");
    assert_eq!(deletes.len(), 3);
    assert_eq!(deletes[0].body["deleteAll"], true);
    assert_eq!(deletes[0].body["namespace"], "ghost");
}

#[test]
fn test_namespace_count_reads_index_stats() {
    let server = existing_index(15, |request| {
        if !request.is("POST", "/describe_index_stats") {
            return not_found();
        }
        (
            200,
            json!({
                "dimension": 15,
                "totalVectorCount": 45,
                "namespaces": { "faq": { "vectorCount": 42 }, "legal": { "vectorCount": 3 } }
            }),
        )
    });
    let manager = connect(&pinecone_config(&server, 30)).unwrap();

    assert_eq!(manager.namespace_count("faq").unwrap(), 42);
    assert_eq!(manager.namespace_count("missing").unwrap(), 0);
}
