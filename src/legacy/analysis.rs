//! Inventory of a legacy store directory, taken without opening any file.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::LegacyResult;

/// What a file in the legacy directory looks like from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// `*.index` / `*.faiss` flat similarity index
    FlatIndex,
    /// `text.pkl`
    PickledTexts,
    /// `metadata.pkl`
    PickledMetadata,
    /// Any other `*.pkl`
    Pickle,
    /// `chroma.sqlite3`
    Catalog,
    /// Other files whose name mentions "metadata"
    MetadataFile,
}

impl ArtifactKind {
    /// Classify a file by name, or `None` for files no detector cares about.
    pub fn classify(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());

        match extension.as_deref() {
            Some("index" | "faiss") => Some(Self::FlatIndex),
            Some("pkl") => Some(match name.as_str() {
                "text.pkl" => Self::PickledTexts,
                "metadata.pkl" => Self::PickledMetadata,
                _ => Self::Pickle,
            }),
            _ if name == "chroma.sqlite3" => Some(Self::Catalog),
            _ if name.contains("metadata") => Some(Self::MetadataFile),
            _ => None,
        }
    }

    fn is_pickle(self) -> bool {
        matches!(self, Self::PickledTexts | Self::PickledMetadata | Self::Pickle)
    }
}

/// One detected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Everything found at the top level of a legacy store directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreAnalysis {
    pub source_dir: PathBuf,
    pub exists: bool,
    pub artifacts: Vec<Artifact>,
    /// Size of every regular file in the directory, recognised or not.
    pub total_bytes: u64,
}

impl StoreAnalysis {
    pub fn count(&self, kind: ArtifactKind) -> usize {
        self.artifacts.iter().filter(|a| a.kind == kind).count()
    }

    pub fn find(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    pub fn of_kind(&self, kind: ArtifactKind) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(move |a| a.kind == kind)
    }

    pub fn pickle_count(&self) -> usize {
        self.artifacts.iter().filter(|a| a.kind.is_pickle()).count()
    }

    /// True when no detector has anything to read.
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl fmt::Display for StoreAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Legacy store: {}", self.source_dir.display())?;
        if !self.exists {
            return writeln!(f, "  (directory does not exist)");
        }
        writeln!(f, "  Total size:      {}", format_megabytes(self.total_bytes))?;
        writeln!(f, "  Flat indexes:    {}", self.count(ArtifactKind::FlatIndex))?;
        writeln!(f, "  Pickle files:    {}", self.pickle_count())?;
        writeln!(
            f,
            "  Catalog:         {}",
            if self.find(ArtifactKind::Catalog).is_some() {
                "yes"
            } else {
                "no"
            }
        )?;
        writeln!(f, "  Metadata files:  {}", self.count(ArtifactKind::MetadataFile))
    }
}

pub(crate) fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Scan the top level of `dir`. A missing directory yields an empty analysis.
pub(crate) fn analyze_dir(dir: &Path) -> LegacyResult<StoreAnalysis> {
    let mut analysis = StoreAnalysis {
        source_dir: dir.to_path_buf(),
        ..StoreAnalysis::default()
    };
    if !dir.is_dir() {
        tracing::warn!(target: "legacy", "source directory {} does not exist", dir.display());
        return Ok(analysis);
    }
    analysis.exists = true;

    let mut entries = std::fs::read_dir(dir)
        .map_err(|source| super::LegacyError::io(dir, source))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    entries.sort();

    for path in entries {
        let bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        analysis.total_bytes += bytes;
        if let Some(kind) = ArtifactKind::classify(&path) {
            tracing::debug!(target: "legacy", "found {kind:?} at {}", path.display());
            analysis.artifacts.push(Artifact { kind, path, bytes });
        }
    }

    Ok(analysis)
}
