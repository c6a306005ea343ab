//! In-process [`VectorIndex`] with brute-force cosine search.
//!
//! Backs the `memory` store backend for offline runs and gives the test
//! suite an index whose calls can be inspected.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use super::index::{IndexDescription, Metric, ScoredRecord, VectorIndex};
use super::{StoreError, StoreResult};
use crate::types::VectorRecord;

#[derive(Default)]
struct MemoryState {
    description: Option<IndexDescription>,
    namespaces: HashMap<String, BTreeMap<String, VectorRecord>>,
    upsert_calls: Vec<UpsertCall>,
}

/// One recorded `upsert` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertCall {
    pub namespace: String,
    pub ids: Vec<String>,
}

/// Vector index kept entirely in memory.
pub struct InMemoryIndex {
    name: String,
    state: RwLock<MemoryState>,
}

impl InMemoryIndex {
    /// An index that does not exist yet; the manager will create it.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(MemoryState::default()),
        }
    }

    /// An index that already exists with `dimension`.
    pub fn with_dimension(name: impl Into<String>, dimension: usize) -> Self {
        let name = name.into();
        let description = IndexDescription {
            name: name.clone(),
            dimension,
            metric: Metric::Cosine,
        };
        Self {
            name,
            state: RwLock::new(MemoryState {
                description: Some(description),
                ..MemoryState::default()
            }),
        }
    }

    /// Every upsert call received so far, in order.
    pub fn upsert_calls(&self) -> Vec<UpsertCall> {
        self.state.read().upsert_calls.clone()
    }

    /// Look up a stored record.
    pub fn get(&self, namespace: &str, id: &str) -> Option<VectorRecord> {
        self.state
            .read()
            .namespaces
            .get(namespace)
            .and_then(|records| records.get(id))
            .cloned()
    }
}

impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> StoreResult<Option<IndexDescription>> {
        Ok(self.state.read().description.clone())
    }

    fn create(&self, dimension: usize, metric: Metric) -> StoreResult<IndexDescription> {
        let mut state = self.state.write();
        if let Some(existing) = &state.description {
            return Err(StoreError::Service(format!(
                "index {} already exists",
                existing.name
            )));
        }
        let description = IndexDescription {
            name: self.name.clone(),
            dimension,
            metric,
        };
        state.description = Some(description.clone());
        Ok(description)
    }

    fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> StoreResult<usize> {
        let mut state = self.state.write();
        let dimension = state
            .description
            .as_ref()
            .map(|d| d.dimension)
            .ok_or_else(|| StoreError::IndexNotFound(self.name.clone()))?;

        // All-or-nothing per call, like the hosted service.
        if let Some(bad) = records.iter().find(|r| r.values.len() != dimension) {
            return Err(StoreError::DimensionMismatch {
                index: self.name.clone(),
                expected: dimension,
                actual: bad.values.len(),
            });
        }

        state.upsert_calls.push(UpsertCall {
            namespace: namespace.to_string(),
            ids: records.iter().map(|r| r.id.clone()).collect(),
        });
        let stored = state.namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> StoreResult<Vec<ScoredRecord>> {
        let state = self.state.read();
        let Some(records) = state.namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredRecord> = records
            .values()
            .map(|record| ScoredRecord {
                id: record.id.clone(),
                score: cosine_similarity(vector, &record.values),
                metadata: Some(record.metadata.clone()),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    fn delete_namespace(&self, namespace: &str) -> StoreResult<()> {
        self.state.write().namespaces.remove(namespace);
        Ok(())
    }

    fn namespace_count(&self, namespace: &str) -> StoreResult<usize> {
        Ok(self
            .state
            .read()
            .namespaces
            .get(namespace)
            .map_or(0, BTreeMap::len))
    }
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
