//! Reader for the `chroma.sqlite3` catalog.
//!
//! Two passes run over the same read-only connection: the native Chroma
//! layout (`embedding_metadata` key/value rows) and a generic probe of any
//! table that looks like it holds document text.

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use super::{LEGACY_COLLECTION, LegacyError, LegacyResult};
use crate::types::DocumentChunk;

/// Rows read per table by the generic probe.
pub const PROBE_ROW_LIMIT: usize = 1000;

const TEXT_COLUMNS: [&str; 4] = ["document", "text", "content", "page_content"];

/// Load documents from the catalog at `path`.
///
/// A table that cannot be read is reported through `warnings`; only failing
/// to open the file at all is an error.
pub fn load_catalog(path: &Path, warnings: &mut Vec<String>) -> LegacyResult<Vec<DocumentChunk>> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| LegacyError::sqlite(path, e))?;

    let tables = table_names(&conn).map_err(|e| LegacyError::sqlite(path, e))?;
    tracing::debug!(target: "legacy", "catalog tables: {tables:?}");

    let mut documents = Vec::new();

    if tables.iter().any(|t| t == "embedding_metadata") {
        match load_native(&conn) {
            Ok(docs) => documents.extend(docs),
            Err(e) => warnings.push(format!(
                "{}: table embedding_metadata: {e}",
                path.display()
            )),
        }
    }

    for table in &tables {
        let lower = table.to_lowercase();
        if !(lower.contains("embedding") || lower.contains("document")) {
            continue;
        }
        match probe_table(&conn, table) {
            Ok(docs) => documents.extend(docs),
            Err(e) => {
                tracing::warn!(target: "legacy", "skipping table {table}: {e}");
                warnings.push(format!("{}: table {table}: {e}", path.display()));
            }
        }
    }

    tracing::info!(
        target: "legacy",
        "loaded {} documents from {}",
        documents.len(),
        path.display()
    );
    Ok(documents)
}

fn table_names(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

/// Chroma keeps each document as a `chroma:document` row keyed by embedding id,
/// with user metadata as sibling rows under the same id.
fn load_native(conn: &Connection) -> rusqlite::Result<Vec<DocumentChunk>> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.string_value,
                (SELECT s.string_value FROM embedding_metadata s
                  WHERE s.id = d.id AND s.key = 'source'),
                (SELECT c.int_value FROM embedding_metadata c
                  WHERE c.id = d.id AND c.key IN ('chunk_id', 'chunk_index')
                  LIMIT 1)
           FROM embedding_metadata d
          WHERE d.key = 'chroma:document'
          ORDER BY d.id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<i64>>(3)?,
        ))
    })?;

    let mut documents = Vec::new();
    for (i, row) in rows.enumerate() {
        let (id, content, source, chunk) = row?;
        let Some(content) = content.filter(|c| !c.trim().is_empty()) else {
            continue;
        };
        documents.push(DocumentChunk::new(
            content,
            source.unwrap_or_else(|| format!("chroma_embedding_{id}")),
            chunk.and_then(|c| u64::try_from(c).ok()).unwrap_or(i as u64),
            LEGACY_COLLECTION,
        ));
    }
    Ok(documents)
}

/// Read up to [`PROBE_ROW_LIMIT`] rows from `table` if it has a text column.
fn probe_table(conn: &Connection, table: &str) -> rusqlite::Result<Vec<DocumentChunk>> {
    let quoted = quote_ident(table);
    let columns = column_names(conn, &quoted)?;

    let Some(text_col) = TEXT_COLUMNS
        .iter()
        .find_map(|want| columns.iter().position(|c| c.eq_ignore_ascii_case(want)))
    else {
        return Ok(Vec::new());
    };
    let source_col = columns.iter().position(|c| c.eq_ignore_ascii_case("source"));
    let chunk_col = columns
        .iter()
        .position(|c| c.eq_ignore_ascii_case("chunk_id") || c.eq_ignore_ascii_case("chunk_index"));

    let mut stmt = conn.prepare(&format!("SELECT * FROM {quoted} LIMIT {PROBE_ROW_LIMIT}"))?;
    let mut rows = stmt.query([])?;

    let mut documents = Vec::new();
    let mut i: u64 = 0;
    while let Some(row) = rows.next()? {
        let position = i;
        i += 1;

        let content = value_text(row.get_ref(text_col)?);
        if content.trim().is_empty() {
            continue;
        }
        let source = match source_col {
            Some(col) => Some(value_text(row.get_ref(col)?)).filter(|s| !s.is_empty()),
            None => None,
        }
        .unwrap_or_else(|| format!("chroma_{table}_{position}"));
        let chunk_index = match chunk_col {
            Some(col) => match row.get_ref(col)? {
                ValueRef::Integer(n) => u64::try_from(n).ok(),
                ValueRef::Text(t) => std::str::from_utf8(t).ok().and_then(|s| s.trim().parse().ok()),
                _ => None,
            },
            None => None,
        }
        .unwrap_or(position);

        documents.push(DocumentChunk::new(content, source, chunk_index, LEGACY_COLLECTION));
    }

    tracing::debug!(
        target: "legacy",
        "table {table}: {} documents from column {}",
        documents.len(),
        columns[text_col]
    );
    Ok(documents)
}

fn column_names(conn: &Connection, quoted_table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({quoted_table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn value_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(n) => n.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    }
}
