//! Reader for the pickled `text.pkl` / `metadata.pkl` pair.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_pickle::{DeOptions, HashableValue, Value};

use super::{LEGACY_COLLECTION, LegacyError, LegacyResult};
use crate::types::DocumentChunk;

/// Load every non-blank text in `text_path`, applying per-position
/// overrides from `metadata_path` when given.
///
/// A metadata file that cannot be read is reported through `warnings` and
/// the texts are still returned with their default sources.
pub fn load_pickled_pair(
    text_path: &Path,
    metadata_path: Option<&Path>,
    warnings: &mut Vec<String>,
) -> LegacyResult<Vec<DocumentChunk>> {
    let texts = match read_value(text_path)? {
        Value::List(items) | Value::Tuple(items) => items,
        other => {
            return Err(LegacyError::Malformed {
                path: text_path.to_path_buf(),
                reason: format!("expected a list of texts, found {}", type_name(&other)),
            });
        }
    };

    let metadata = match metadata_path {
        Some(path) => match read_value(path) {
            Ok(Value::List(items) | Value::Tuple(items)) => items,
            Ok(other) => {
                warnings.push(format!(
                    "{}: expected a list of dicts, found {}; using default sources",
                    path.display(),
                    type_name(&other)
                ));
                Vec::new()
            }
            Err(e) => {
                warnings.push(format!("{e}; using default sources"));
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let mut documents = Vec::new();
    for (i, item) in texts.iter().enumerate() {
        let Some(content) = text_form(item) else {
            tracing::debug!(
                target: "legacy",
                "text.pkl entry {i} is a {}, skipping",
                type_name(item)
            );
            continue;
        };
        if content.trim().is_empty() {
            continue;
        }

        let mut source = format!("local_store_document_{i}");
        let mut chunk_index = i as u64;
        if let Some(Value::Dict(meta)) = metadata.get(i) {
            if let Some(s) = lookup(meta, "source").and_then(text_form) {
                source = s;
            }
            if let Some(idx) = lookup(meta, "chunk_id")
                .or_else(|| lookup(meta, "chunk_index"))
                .and_then(index_form)
            {
                chunk_index = idx;
            }
        }

        documents.push(DocumentChunk::new(
            content,
            source,
            chunk_index,
            LEGACY_COLLECTION,
        ));
    }

    tracing::info!(
        target: "legacy",
        "loaded {} documents from {}",
        documents.len(),
        text_path.display()
    );
    Ok(documents)
}

fn read_value(path: &Path) -> LegacyResult<Value> {
    let file = File::open(path).map_err(|e| LegacyError::io(path, e))?;
    serde_pickle::value_from_reader(
        BufReader::new(file),
        DeOptions::new().replace_unresolved_globals(),
    )
    .map_err(|e| LegacyError::Pickle {
        path: path.to_path_buf(),
        source: e,
    })
}

fn lookup<'a>(dict: &'a BTreeMap<HashableValue, Value>, key: &str) -> Option<&'a Value> {
    dict.get(&HashableValue::String(key.to_string()))
}

/// The string a scalar stands for; dicts yield their `page_content`/`content`/`text` entry.
fn text_form(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        Value::I64(n) => Some(n.to_string()),
        Value::Int(n) => Some(n.to_string()),
        Value::F64(f) => Some(f.to_string()),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) | Value::None => Some(String::new()),
        Value::Dict(map) => ["page_content", "content", "text"]
            .into_iter()
            .find_map(|key| lookup(map, key))
            .and_then(text_form),
        _ => None,
    }
}

fn index_form(value: &Value) -> Option<u64> {
    match value {
        Value::I64(n) => u64::try_from(*n).ok(),
        Value::String(s) => s.trim().parse().ok(),
        Value::F64(f) if *f >= 0.0 && f.fract() == 0.0 => Some(*f as u64),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::None => "None",
        Value::Bool(_) => "bool",
        Value::I64(_) | Value::Int(_) => "int",
        Value::F64(_) => "float",
        Value::Bytes(_) => "bytes",
        Value::String(_) => "str",
        Value::List(_) => "list",
        Value::Tuple(_) => "tuple",
        Value::Set(_) | Value::FrozenSet(_) => "set",
        Value::Dict(_) => "dict",
    }
}
