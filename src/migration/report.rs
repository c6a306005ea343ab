//! What a migration run did, for the operator.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::embedding::ProviderInfo;
use crate::legacy::StoreAnalysis;
use crate::types::truncate_chars;

/// Stages of a migration run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStage {
    Analyze,
    Load,
    Dedupe,
    ReEmbed,
    Upsert,
    Verify,
    Report,
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Analyze => "analyze",
            Self::Load => "load",
            Self::Dedupe => "dedupe",
            Self::ReEmbed => "re-embed",
            Self::Upsert => "upsert",
            Self::Verify => "verify",
            Self::Report => "report",
        };
        f.write_str(name)
    }
}

/// A batch that failed during re-embedding or upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedBatch {
    pub stage: MigrationStage,
    /// Source of the first document (re-embed) or first record id (upsert).
    pub first: String,
    pub size: usize,
    pub reason: String,
}

/// Outcome of one sample query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub query: String,
    pub hits: usize,
    pub top_score: Option<f32>,
    /// Start of the best match's content.
    pub preview: Option<String>,
    pub error: Option<String>,
}

const PREVIEW_CHARS: usize = 100;

impl VerificationResult {
    pub(crate) fn preview_of(content: &str) -> String {
        let (kept, _) = truncate_chars(content, PREVIEW_CHARS);
        kept.replace('\n', " ")
    }
}

/// Final tally of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub source_dir: PathBuf,
    pub namespace: String,
    pub dry_run: bool,
    pub provider: ProviderInfo,
    pub stages: Vec<MigrationStage>,
    pub analysis: StoreAnalysis,
    /// Unique documents read from the legacy store.
    pub found: usize,
    /// Documents accepted by the index.
    pub migrated: usize,
    /// Duplicates dropped during load.
    pub skipped: usize,
    /// Documents lost to failed embedding or upsert batches.
    pub failed: usize,
    pub warnings: Vec<String>,
    pub failed_batches: Vec<FailedBatch>,
    pub verification: Vec<VerificationResult>,
}

impl MigrationReport {
    /// `migrated / found`, or `None` when nothing was found.
    pub fn success_rate(&self) -> Option<f64> {
        (self.found > 0).then(|| self.migrated as f64 / self.found as f64)
    }

    pub fn completed(&self, stage: MigrationStage) -> bool {
        self.stages.contains(&stage)
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "MIGRATION SUMMARY{}",
            if self.dry_run { " (dry run)" } else { "" }
        )?;
        writeln!(f, "{rule}")?;
        write!(f, "{}", self.analysis)?;
        writeln!(
            f,
            "Embedder:            {} / {} ({} dims)",
            self.provider.provider_name, self.provider.model_identifier, self.provider.dimension
        )?;
        writeln!(f, "Target namespace:    {}", self.namespace)?;
        writeln!(f, "Documents found:     {}", self.found)?;
        writeln!(f, "Documents migrated:  {}", self.migrated)?;
        writeln!(f, "Duplicates skipped:  {}", self.skipped)?;
        writeln!(f, "Failed:              {}", self.failed)?;
        match self.success_rate() {
            Some(rate) => writeln!(f, "Success rate:        {:.1}%", rate * 100.0)?,
            None => writeln!(f, "Success rate:        n/a")?,
        }

        if !self.failed_batches.is_empty() {
            writeln!(f, "\nFailed batches:")?;
            for batch in &self.failed_batches {
                writeln!(
                    f,
                    "  [{}] {} records from {}: {}",
                    batch.stage, batch.size, batch.first, batch.reason
                )?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f, "\nWarnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  {warning}")?;
            }
        }

        if !self.verification.is_empty() {
            writeln!(f, "\nVerification:")?;
            for result in &self.verification {
                match (&result.error, result.top_score) {
                    (Some(error), _) => writeln!(f, "  '{}': error: {error}", result.query)?,
                    (None, Some(score)) => writeln!(
                        f,
                        "  '{}': {} hits, top score {score:.3} - {}",
                        result.query,
                        result.hits,
                        result.preview.as_deref().unwrap_or_default()
                    )?,
                    (None, None) => writeln!(f, "  '{}': no results", result.query)?,
                }
            }
        }

        if self.dry_run {
            writeln!(f, "\nDry run: nothing was written. Re-run without --dry-run to migrate.")?;
        }
        write!(f, "{rule}")
    }
}
