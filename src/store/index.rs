//! The seam between the manager and a concrete vector index service.

use serde::{Deserialize, Serialize};

use super::StoreResult;
use crate::types::{RecordMetadata, VectorRecord};

/// Similarity metric an index is created with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Euclidean,
    Dotproduct,
}

/// What the service reports about an existing index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
}

/// A stored record with its similarity to the query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub id: String,
    pub score: f32,
    pub metadata: Option<RecordMetadata>,
}

/// Operations the manager needs from a hosted vector index.
///
/// Every data operation is scoped to a single namespace; namespaces come into
/// existence on first write. All calls block until the service answers.
pub trait VectorIndex: Send + Sync {
    /// Index name as known to the service.
    fn name(&self) -> &str;

    /// Describe the index, or `None` if it does not exist.
    fn describe(&self) -> StoreResult<Option<IndexDescription>>;

    /// Create the index.
    fn create(&self, dimension: usize, metric: Metric) -> StoreResult<IndexDescription>;

    /// Insert or overwrite `records` by id. Returns the number accepted.
    fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> StoreResult<usize>;

    /// Top-`top_k` records by similarity, highest first.
    fn query(&self, namespace: &str, vector: &[f32], top_k: usize)
    -> StoreResult<Vec<ScoredRecord>>;

    /// Remove every record in `namespace`.
    fn delete_namespace(&self, namespace: &str) -> StoreResult<()>;

    /// Number of records currently stored in `namespace`.
    fn namespace_count(&self, namespace: &str) -> StoreResult<usize>;
}
