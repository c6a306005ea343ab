//! Legacy local vector store reader.
//!
//! A legacy store directory may hold any mix of a flat similarity index, a
//! pickled text/metadata pair and a Chroma SQLite catalog. Each format has a
//! detector; [`LegacyStoreReader::load`] runs every detector whose files are
//! present, unions the results and drops repeated content.
//!
//! Per-file failures never abort a load. They are logged and collected as
//! warnings so a migration can proceed with whatever sources are readable.

mod analysis;
mod catalog;
mod flat_index;
mod pickle;

pub use analysis::{Artifact, ArtifactKind, StoreAnalysis};
pub use catalog::PROBE_ROW_LIMIT;
pub use flat_index::{FlatIndexHeader, FlatMetric};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::types::DocumentChunk;

/// Collection label carried by chunks until the migration assigns a namespace.
pub const LEGACY_COLLECTION: &str = "legacy";

#[derive(Error, Debug)]
pub enum LegacyError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to unpickle {path}: {source}")]
    Pickle {
        path: PathBuf,
        #[source]
        source: serde_pickle::Error,
    },

    #[error("Failed to read catalog {path}: {source}")]
    Sqlite {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Unsupported index type '{fourcc}' in {path}")]
    UnsupportedIndex { path: PathBuf, fourcc: String },

    #[error("Malformed file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl LegacyError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn sqlite(path: &Path, source: rusqlite::Error) -> Self {
        Self::Sqlite {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type LegacyResult<T> = Result<T, LegacyError>;

/// Documents contributed by one detected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub documents: usize,
}

/// A flat index that was found and left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatIndexSummary {
    pub path: PathBuf,
    pub header: FlatIndexHeader,
}

/// Result of [`LegacyStoreReader::load`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// Unique documents, first occurrence order.
    #[serde(skip)]
    pub documents: Vec<DocumentChunk>,
    /// Documents dropped because an earlier one had the same content.
    pub duplicates: usize,
    pub sources: Vec<SourceSummary>,
    pub flat_indexes: Vec<FlatIndexSummary>,
    pub warnings: Vec<String>,
}

impl LoadReport {
    /// Documents read before deduplication.
    pub fn total_read(&self) -> usize {
        self.sources.iter().map(|s| s.documents).sum()
    }
}

/// Reads a legacy store directory.
#[derive(Debug, Clone)]
pub struct LegacyStoreReader {
    source_dir: PathBuf,
}

impl LegacyStoreReader {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// List what is on disk without opening anything.
    pub fn analyze(&self) -> LegacyResult<StoreAnalysis> {
        let analysis = analysis::analyze_dir(&self.source_dir)?;
        tracing::info!(
            target: "legacy",
            "analyzed {}: {} artifacts, {}",
            self.source_dir.display(),
            analysis.artifacts.len(),
            analysis::format_megabytes(analysis.total_bytes)
        );
        Ok(analysis)
    }

    /// Run every applicable detector and return the deduplicated documents.
    pub fn load(&self) -> LegacyResult<LoadReport> {
        let analysis = self.analyze()?;
        self.load_analyzed(&analysis)
    }

    /// [`load`](Self::load) for an analysis already taken.
    pub fn load_analyzed(&self, analysis: &StoreAnalysis) -> LegacyResult<LoadReport> {
        let mut report = LoadReport::default();
        let mut collected: Vec<DocumentChunk> = Vec::new();

        for detector in DETECTORS {
            for (kind, path, result) in detector(analysis, &mut report) {
                match result {
                    Ok(docs) => {
                        report.sources.push(SourceSummary {
                            kind,
                            path,
                            documents: docs.len(),
                        });
                        collected.extend(docs);
                    }
                    Err(e) => {
                        tracing::warn!(target: "legacy", "skipping {}: {e}", path.display());
                        report.warnings.push(e.to_string());
                    }
                }
            }
        }

        let (documents, duplicates) = dedupe(collected);
        report.documents = documents;
        report.duplicates = duplicates;

        tracing::info!(
            target: "legacy",
            "found {} unique documents ({} duplicates skipped, {} warnings)",
            report.documents.len(),
            report.duplicates,
            report.warnings.len()
        );
        Ok(report)
    }
}

type DetectorOutput = Vec<(ArtifactKind, PathBuf, LegacyResult<Vec<DocumentChunk>>)>;
type Detector = fn(&StoreAnalysis, &mut LoadReport) -> DetectorOutput;

/// Detectors run in this order; dedup keeps the first occurrence.
const DETECTORS: [Detector; 3] = [detect_flat_indexes, detect_pickled_pair, detect_catalog];

fn detect_flat_indexes(analysis: &StoreAnalysis, report: &mut LoadReport) -> DetectorOutput {
    analysis
        .of_kind(ArtifactKind::FlatIndex)
        .map(|artifact| {
            let result = flat_index::read_header(&artifact.path).map(|header| {
                tracing::info!(
                    target: "legacy",
                    "{}: {:?} index, {} vectors of {} dims (vectors only, no text to migrate)",
                    artifact.path.display(),
                    header.metric,
                    header.vectors,
                    header.dimension
                );
                report.flat_indexes.push(FlatIndexSummary {
                    path: artifact.path.clone(),
                    header,
                });
                Vec::new()
            });
            (ArtifactKind::FlatIndex, artifact.path.clone(), result)
        })
        .collect()
}

fn detect_pickled_pair(analysis: &StoreAnalysis, report: &mut LoadReport) -> DetectorOutput {
    let Some(texts) = analysis.find(ArtifactKind::PickledTexts) else {
        return Vec::new();
    };
    let metadata = analysis
        .find(ArtifactKind::PickledMetadata)
        .map(|a| a.path.as_path());
    let result = pickle::load_pickled_pair(&texts.path, metadata, &mut report.warnings);
    vec![(ArtifactKind::PickledTexts, texts.path.clone(), result)]
}

fn detect_catalog(analysis: &StoreAnalysis, report: &mut LoadReport) -> DetectorOutput {
    let Some(catalog) = analysis.find(ArtifactKind::Catalog) else {
        return Vec::new();
    };
    let result = catalog::load_catalog(&catalog.path, &mut report.warnings);
    vec![(ArtifactKind::Catalog, catalog.path.clone(), result)]
}

/// Keep the first chunk for each distinct content, returning the survivors
/// and how many were dropped.
pub fn dedupe(documents: Vec<DocumentChunk>) -> (Vec<DocumentChunk>, usize) {
    let mut seen: HashSet<[u8; 32]> = HashSet::with_capacity(documents.len());
    let total = documents.len();
    let unique: Vec<DocumentChunk> = documents
        .into_iter()
        .filter(|doc| seen.insert(Sha256::digest(doc.content().as_bytes()).into()))
        .collect();
    let duplicates = total - unique.len();
    (unique, duplicates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_keeps_first() {
        let docs = vec![
            DocumentChunk::new("same", "a", 0, LEGACY_COLLECTION),
            DocumentChunk::new("other", "b", 0, LEGACY_COLLECTION),
            DocumentChunk::new("same", "c", 5, LEGACY_COLLECTION),
        ];
        let (unique, duplicates) = dedupe(docs);
        assert_eq!(duplicates, 1);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].source(), "a");
    }

    #[test]
    fn test_dedupe_uses_full_content() {
        let prefix = "x".repeat(200);
        let docs = vec![
            DocumentChunk::new(format!("{prefix}a"), "a", 0, LEGACY_COLLECTION),
            DocumentChunk::new(format!("{prefix}b"), "b", 0, LEGACY_COLLECTION),
        ];
        let (unique, duplicates) = dedupe(docs);
        assert_eq!(unique.len(), 2);
        assert_eq!(duplicates, 0);
    }

    #[test]
    fn test_corrupt_source_becomes_warning() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("text.pkl"), b"garbage").unwrap();
        std::fs::write(
            dir.path().join("vectors.index"),
            flat_index::header_bytes(b"IxF2", 8, 3),
        )
        .unwrap();

        let report = LegacyStoreReader::new(dir.path()).load().unwrap();
        assert!(report.documents.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.flat_indexes.len(), 1);
        assert_eq!(report.flat_indexes[0].header.vectors, 3);
    }
}
