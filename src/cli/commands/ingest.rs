//! Ingest command: upsert pre-chunked text from a JSON Lines file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::config::Settings;
use crate::types::DocumentChunk;

use super::connect_store;

/// One line of the input file.
#[derive(Debug, Deserialize)]
struct ChunkLine {
    content: String,
    source: String,
    /// Defaults to the chunk's position among lines with the same source.
    #[serde(default)]
    chunk_index: Option<u64>,
}

/// Parse a JSON Lines file into chunks for `namespace`. Blank lines are ignored.
pub fn read_chunks(path: &Path, namespace: &str) -> anyhow::Result<Vec<DocumentChunk>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    // Next implicit index per source; `None` once an index of `u64::MAX` was used.
    let mut per_source: HashMap<String, Option<u64>> = HashMap::new();
    let mut chunks = Vec::new();

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: ChunkLine = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid chunk", path.display(), line_no + 1))?;

        let next = per_source.entry(parsed.source.clone()).or_insert(Some(0));
        let chunk_index = match parsed.chunk_index {
            Some(index) => index,
            None => next.ok_or_else(|| {
                anyhow::anyhow!(
                    "{}:{}: no chunk_index left for {} after {}",
                    path.display(),
                    line_no + 1,
                    parsed.source,
                    u64::MAX
                )
            })?,
        };
        *next = chunk_index.checked_add(1);

        chunks.push(DocumentChunk::new(
            parsed.content,
            parsed.source,
            chunk_index,
            namespace,
        ));
    }
    Ok(chunks)
}

/// Run ingest command.
pub fn run(file: &Path, namespace: &str, json: bool, settings: &Settings) -> anyhow::Result<()> {
    let chunks = read_chunks(file, namespace)?;
    tracing::info!(target: "cli", "read {} chunks from {}", chunks.len(), file.display());

    let (_, manager) = connect_store(settings)?;
    let report = manager.upsert_chunks(&chunks)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Upserted {} chunks into '{namespace}' ({} skipped, {} failed, {} batches)",
            report.submitted, report.skipped, report.failed, report.batches
        );
        for failure in &report.failed_batches {
            println!("  failed batch starting at {}: {}", failure.first_id, failure.reason);
        }
    }
    Ok(())
}
