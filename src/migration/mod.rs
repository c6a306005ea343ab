//! Migration of a legacy local vector store into the hosted index.
//!
//! A run walks `Analyze → Load → Dedupe → Re-embed → Upsert → Verify → Report`.
//! Dry runs stop after dedupe and never touch the index. Batch failures are
//! recorded and the run continues; missing infrastructure fails the run
//! before anything is written.

mod report;

pub use report::{FailedBatch, MigrationReport, MigrationStage, VerificationResult};

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::config::MigrationConfig;
use crate::embedding::EmbeddingProvider;
use crate::legacy::{LegacyError, LegacyStoreReader};
use crate::store::{StoreError, VectorStoreManager};
use crate::types::{DocumentChunk, Embedding};

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("A vector store connection is required unless --dry-run is set")]
    StoreRequired,

    #[error("Invalid migration option: {0}")]
    InvalidOption(String),

    #[error("Legacy store error: {0}")]
    Legacy(#[from] LegacyError),

    #[error("Vector store error: {0}")]
    Store(#[from] StoreError),
}

pub type MigrationResult<T> = Result<T, MigrationError>;

/// Knobs for one migration run.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationOptions {
    pub source_dir: PathBuf,
    pub namespace: String,
    pub dry_run: bool,
    pub verify: bool,
    pub embed_batch_size: usize,
    pub sample_queries: Vec<String>,
    pub verify_top_k: usize,
}

impl MigrationOptions {
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            source_dir: config.source_dir.clone(),
            namespace: config.namespace.clone(),
            dry_run: false,
            verify: true,
            embed_batch_size: config.embed_batch_size,
            sample_queries: config.verify_queries.clone(),
            verify_top_k: config.verify_top_k,
        }
    }
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self::from_config(&MigrationConfig::default())
    }
}

/// Runs one migration against an optional store.
pub struct MigrationOrchestrator<'a> {
    provider: Arc<dyn EmbeddingProvider>,
    store: Option<&'a VectorStoreManager>,
    options: MigrationOptions,
}

impl<'a> MigrationOrchestrator<'a> {
    /// `store` may be `None` only for dry runs.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Option<&'a VectorStoreManager>,
        options: MigrationOptions,
    ) -> Self {
        Self {
            provider,
            store,
            options,
        }
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    pub fn run(&self) -> MigrationResult<MigrationReport> {
        let store = match (self.store, self.options.dry_run) {
            (Some(store), _) => Some(store),
            (None, true) => None,
            (None, false) => return Err(MigrationError::StoreRequired),
        };
        if self.options.namespace.trim().is_empty() {
            return Err(MigrationError::InvalidOption(
                "namespace must not be empty".to_string(),
            ));
        }

        let reader = LegacyStoreReader::new(&self.options.source_dir);

        tracing::info!(target: "migration", "analyzing {}", reader.source_dir().display());
        let analysis = reader.analyze()?;
        let mut report = MigrationReport {
            source_dir: self.options.source_dir.clone(),
            namespace: self.options.namespace.clone(),
            dry_run: self.options.dry_run,
            provider: self.provider.provider_info(),
            stages: vec![MigrationStage::Analyze],
            analysis,
            found: 0,
            migrated: 0,
            skipped: 0,
            failed: 0,
            warnings: Vec::new(),
            failed_batches: Vec::new(),
            verification: Vec::new(),
        };

        let loaded = reader.load_analyzed(&report.analysis)?;
        report.stages.push(MigrationStage::Load);
        report.stages.push(MigrationStage::Dedupe);
        report.found = loaded.documents.len();
        report.skipped = loaded.duplicates;
        report.warnings = loaded.warnings;
        tracing::info!(
            target: "migration",
            "loaded {} unique documents ({} duplicates)",
            report.found,
            report.skipped
        );

        let Some(store) = store.filter(|_| !self.options.dry_run) else {
            tracing::info!(
                target: "migration",
                "dry run: would re-embed and upsert {} documents into {}",
                report.found,
                self.options.namespace
            );
            report.stages.push(MigrationStage::Report);
            return Ok(report);
        };

        let embedded = self.re_embed(loaded.documents, &mut report);
        report.stages.push(MigrationStage::ReEmbed);

        if !embedded.is_empty() {
            let upserted = store.upsert_embedded(embedded)?;
            report.migrated = upserted.submitted;
            report.failed += upserted.failed;
            report
                .failed_batches
                .extend(upserted.failed_batches.into_iter().map(|b| FailedBatch {
                    stage: MigrationStage::Upsert,
                    first: b.first_id,
                    size: b.size,
                    reason: b.reason,
                }));
        }
        report.stages.push(MigrationStage::Upsert);

        if self.options.verify {
            report.verification = self.verify(store);
            report.stages.push(MigrationStage::Verify);
        }

        report.stages.push(MigrationStage::Report);
        tracing::info!(
            target: "migration",
            "migrated {}/{} documents into {} ({} failed)",
            report.migrated,
            report.found,
            self.options.namespace,
            report.failed
        );
        Ok(report)
    }

    /// Embed documents in fixed-size batches straight through the provider.
    ///
    /// A failing batch is recorded and its documents left out.
    fn re_embed(
        &self,
        documents: Vec<DocumentChunk>,
        report: &mut MigrationReport,
    ) -> Vec<(DocumentChunk, Embedding)> {
        let batch_size = self.options.embed_batch_size.max(1);
        let total_batches = documents.len().div_ceil(batch_size);
        let mut embedded = Vec::with_capacity(documents.len());

        let mut documents = documents.into_iter().peekable();
        let mut batch_no = 0;
        while documents.peek().is_some() {
            batch_no += 1;
            let batch: Vec<DocumentChunk> = documents.by_ref().take(batch_size).collect();
            let texts: Vec<&str> = batch.iter().map(DocumentChunk::content).collect();
            tracing::debug!(
                target: "migration",
                "re-embedding batch {batch_no}/{total_batches} ({} documents)",
                batch.len()
            );

            match self.provider.generate(&texts) {
                Ok(vectors) => {
                    embedded.extend(batch.into_iter().zip(vectors).map(|(doc, vector)| {
                        (doc.into_collection(self.options.namespace.as_str()), vector)
                    }));
                }
                Err(e) => {
                    tracing::warn!(
                        target: "migration",
                        "re-embedding batch {batch_no}/{total_batches} failed: {e}"
                    );
                    report.failed += batch.len();
                    report.failed_batches.push(FailedBatch {
                        stage: MigrationStage::ReEmbed,
                        first: batch.first().map(|d| d.source().to_string()).unwrap_or_default(),
                        size: batch.len(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        embedded
    }

    fn verify(&self, store: &VectorStoreManager) -> Vec<VerificationResult> {
        self.options
            .sample_queries
            .iter()
            .map(|query| {
                match store.query(&self.options.namespace, query, self.options.verify_top_k) {
                    Ok(matches) => {
                        let best = matches.first();
                        tracing::info!(
                            target: "migration",
                            "verify '{query}': {} hits",
                            matches.len()
                        );
                        VerificationResult {
                            query: query.clone(),
                            hits: matches.len(),
                            top_score: best.map(|m| m.score),
                            preview: best.map(|m| VerificationResult::preview_of(&m.content)),
                            error: None,
                        }
                    }
                    Err(e) => {
                        tracing::warn!(target: "migration", "verify '{query}' failed: {e}");
                        VerificationResult {
                            query: query.clone(),
                            hits: 0,
                            top_score: None,
                            preview: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect()
    }
}
