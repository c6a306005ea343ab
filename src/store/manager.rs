//! Vector store manager: connects to one index and owns batching, ids and
//! query shaping on top of a [`VectorIndex`].

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;

use super::index::{IndexDescription, Metric, VectorIndex};
use super::{StoreError, StoreResult};
use crate::config::StoreConfig;
use crate::embedding::{EmbeddingCache, EmbeddingError, EmbeddingProvider};
use crate::types::{DocumentChunk, Embedding, QueryMatch, VectorRecord};

/// A remote upsert call that the service rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub namespace: String,
    pub first_id: String,
    pub size: usize,
    pub reason: String,
}

/// Outcome of an upsert operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpsertReport {
    /// Records accepted by the index.
    pub submitted: usize,
    /// Chunks dropped before embedding because they had no text.
    pub skipped: usize,
    /// Chunks lost to embedding failures or rejected batches.
    pub failed: usize,
    /// Remote upsert calls made.
    pub batches: usize,
    pub failed_batches: Vec<BatchFailure>,
}

impl UpsertReport {
    fn merge(&mut self, other: UpsertReport) {
        self.submitted += other.submitted;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.batches += other.batches;
        self.failed_batches.extend(other.failed_batches);
    }
}

/// Handle on a connected index plus the embedding provider feeding it.
pub struct VectorStoreManager {
    index: Arc<dyn VectorIndex>,
    cache: EmbeddingCache,
    description: IndexDescription,
    batch_size: usize,
    batch_pause: Duration,
}

impl VectorStoreManager {
    /// Connect to `index`, creating it with the provider's dimension when absent.
    ///
    /// An existing index whose dimension differs from the provider's is an
    /// error; the index is never recreated here.
    pub fn connect(
        index: Arc<dyn VectorIndex>,
        provider: Arc<dyn EmbeddingProvider>,
        config: &StoreConfig,
    ) -> StoreResult<Self> {
        let dimension = provider.dimension();
        let description = match index.describe()? {
            Some(existing) => {
                if existing.dimension != dimension {
                    return Err(StoreError::DimensionMismatch {
                        index: existing.name,
                        expected: existing.dimension,
                        actual: dimension,
                    });
                }
                tracing::debug!(
                    target: "store",
                    "connected to index {} ({} dims)",
                    existing.name,
                    existing.dimension
                );
                existing
            }
            None => {
                tracing::info!(
                    target: "store",
                    "index {} not found, creating it with {dimension} dims",
                    index.name()
                );
                index.create(dimension, Metric::Cosine)?
            }
        };

        Ok(Self {
            index,
            cache: EmbeddingCache::new(provider, config.cache_capacity),
            description,
            batch_size: config.upsert_batch_size.max(1),
            batch_pause: Duration::from_millis(config.batch_pause_ms),
        })
    }

    pub fn index_name(&self) -> &str {
        &self.description.name
    }

    pub fn dimension(&self) -> usize {
        self.description.dimension
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        self.cache.provider()
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Embed and write `chunks`, each into the namespace named by its collection.
    ///
    /// Blank chunks are skipped. If the batched embedding call fails, chunks
    /// are embedded one at a time so a single bad chunk only fails itself.
    /// The one-by-one pass stops at the first [`EmbeddingError::Unavailable`]
    /// and counts the remaining chunks as failed without calling the provider.
    pub fn upsert_chunks(&self, chunks: &[DocumentChunk]) -> StoreResult<UpsertReport> {
        let mut report = UpsertReport::default();
        let live: Vec<&DocumentChunk> = chunks.iter().filter(|c| !c.is_blank()).collect();
        report.skipped = chunks.len() - live.len();
        if live.is_empty() {
            return Ok(report);
        }

        let texts: Vec<&str> = live.iter().map(|c| c.content()).collect();
        let vectors: Vec<Option<Embedding>> = match self.cache.get_or_compute(&texts) {
            Ok(vectors) => vectors.into_iter().map(Some).collect(),
            Err(e) => {
                tracing::warn!(
                    target: "store",
                    "batch embedding of {} chunks failed ({e}), retrying one by one",
                    live.len()
                );
                let mut provider_down = false;
                live.iter()
                    .map(|chunk| {
                        if provider_down {
                            return None;
                        }
                        match self.cache.get_or_compute_one(chunk.content()) {
                            Ok(vector) => Some(vector),
                            Err(EmbeddingError::Unavailable(reason)) => {
                                tracing::warn!(
                                    target: "store",
                                    "embedding provider unavailable ({reason}), \
                                     failing the remaining chunks"
                                );
                                provider_down = true;
                                None
                            }
                            Err(e) => {
                                tracing::warn!(
                                    target: "store",
                                    "skipping chunk {} of {}: {e}",
                                    chunk.chunk_index(),
                                    chunk.source()
                                );
                                None
                            }
                        }
                    })
                    .collect()
            }
        };

        let records: Vec<(String, VectorRecord)> = live
            .into_iter()
            .zip(vectors)
            .filter_map(|(chunk, vector)| match vector {
                Some(values) => {
                    let namespace = chunk.collection().to_string();
                    let record = VectorRecord::from_chunk(&namespace, chunk, values);
                    Some((namespace, record))
                }
                None => {
                    report.failed += 1;
                    None
                }
            })
            .collect();

        report.merge(self.submit(records)?);
        Ok(report)
    }

    /// Write chunks whose vectors were computed elsewhere.
    pub fn upsert_embedded(
        &self,
        items: Vec<(DocumentChunk, Embedding)>,
    ) -> StoreResult<UpsertReport> {
        let records = items
            .into_iter()
            .map(|(chunk, values)| {
                let namespace = chunk.collection().to_string();
                let record = VectorRecord::from_chunk(&namespace, &chunk, values);
                (namespace, record)
            })
            .collect();
        self.submit(records)
    }

    /// Write ready-made records into one namespace.
    pub fn upsert_records(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> StoreResult<UpsertReport> {
        let records = records
            .into_iter()
            .map(|record| (namespace.to_string(), record))
            .collect();
        self.submit(records)
    }

    /// Top-`top_k` chunks in `namespace` most similar to `text`, best first.
    ///
    /// Blank text or a zero `top_k` returns no matches without embedding.
    /// Hits stored without readable metadata are left out.
    pub fn query(&self, namespace: &str, text: &str, top_k: usize) -> StoreResult<Vec<QueryMatch>> {
        if text.trim().is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.cache.get_or_compute_one(text)?;
        let mut matches: Vec<QueryMatch> = self
            .index
            .query(namespace, &vector, top_k)?
            .into_iter()
            .filter_map(|hit| {
                let Some(metadata) = hit.metadata else {
                    tracing::debug!(target: "store", "dropping hit {} without metadata", hit.id);
                    return None;
                };
                Some(QueryMatch {
                    id: hit.id,
                    content: metadata.content,
                    source: metadata.source,
                    chunk_index: metadata.chunk_index,
                    score: hit.score,
                })
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);

        tracing::debug!(
            target: "store",
            "query in {namespace} returned {} matches",
            matches.len()
        );
        Ok(matches)
    }

    /// Remove every record in `namespace`.
    pub fn delete_namespace(&self, namespace: &str) -> StoreResult<()> {
        self.index.delete_namespace(namespace)?;
        tracing::info!(target: "store", "deleted namespace {namespace}");
        Ok(())
    }

    /// Records currently stored in `namespace`.
    pub fn namespace_count(&self, namespace: &str) -> StoreResult<usize> {
        self.index.namespace_count(namespace)
    }

    /// Validate dimensions, then send `records` in order, in batches that
    /// never span namespaces.
    fn submit(&self, records: Vec<(String, VectorRecord)>) -> StoreResult<UpsertReport> {
        let expected = self.description.dimension;
        if let Some((_, bad)) = records.iter().find(|(_, r)| r.values.len() != expected) {
            return Err(StoreError::DimensionMismatch {
                index: self.description.name.clone(),
                expected,
                actual: bad.values.len(),
            });
        }

        let mut report = UpsertReport::default();
        for (namespace, batch) in namespace_batches(records, self.batch_size) {
            if report.batches > 0 && !self.batch_pause.is_zero() {
                thread::sleep(self.batch_pause);
            }
            report.batches += 1;

            match self.index.upsert(&namespace, &batch) {
                Ok(_) => {
                    report.submitted += batch.len();
                    tracing::debug!(
                        target: "store",
                        "upserted batch {} ({} records) into {namespace}",
                        report.batches,
                        batch.len()
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        target: "store",
                        "batch {} ({} records) into {namespace} failed: {e}",
                        report.batches,
                        batch.len()
                    );
                    report.failed += batch.len();
                    report.failed_batches.push(BatchFailure {
                        first_id: batch.first().map(|r| r.id.clone()).unwrap_or_default(),
                        size: batch.len(),
                        reason: e.to_string(),
                        namespace,
                    });
                }
            }
        }

        tracing::info!(
            target: "store",
            "upserted {} records in {} batches ({} failed)",
            report.submitted,
            report.batches,
            report.failed
        );
        Ok(report)
    }
}

/// Split `records` into consecutive runs of one namespace, each at most `size` long.
fn namespace_batches(
    records: Vec<(String, VectorRecord)>,
    size: usize,
) -> Vec<(String, Vec<VectorRecord>)> {
    let mut batches: Vec<(String, Vec<VectorRecord>)> = Vec::new();
    for (namespace, record) in records {
        match batches.last_mut() {
            Some((current, batch)) if *current == namespace && batch.len() < size => {
                batch.push(record);
            }
            _ => batches.push((namespace, vec![record])),
        }
    }
    batches
}
