//! Header reader for FAISS flat index files.
//!
//! Flat indexes store raw vectors and no text, so nothing here produces
//! documents; the header is read to report what is being left behind.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;

use super::{LegacyError, LegacyResult};

/// Distance used by a flat index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatMetric {
    InnerProduct,
    L2,
}

/// Fields at the start of an `IndexFlat` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlatIndexHeader {
    pub metric: FlatMetric,
    pub dimension: u32,
    pub vectors: u64,
}

/// Parse the header of a serialized `IndexFlatIP` / `IndexFlatL2`.
///
/// Layout (little-endian): fourcc, `d: i32`, `ntotal: i64`, two reserved
/// `i64`, `is_trained: u8`, `metric_type: i32`.
pub fn read_header(path: &Path) -> LegacyResult<FlatIndexHeader> {
    let file = File::open(path).map_err(|e| LegacyError::io(path, e))?;
    let mut reader = BufReader::new(file);
    parse_header(&mut reader).map_err(|reason| match reason {
        HeaderError::Io(e) => LegacyError::io(path, e),
        HeaderError::Unsupported(fourcc) => LegacyError::UnsupportedIndex {
            path: path.to_path_buf(),
            fourcc,
        },
        HeaderError::Malformed(reason) => LegacyError::Malformed {
            path: path.to_path_buf(),
            reason,
        },
    })
}

enum HeaderError {
    Io(std::io::Error),
    Unsupported(String),
    Malformed(String),
}

impl From<std::io::Error> for HeaderError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            HeaderError::Malformed("file ends inside the header".to_string())
        } else {
            HeaderError::Io(e)
        }
    }
}

fn parse_header(reader: &mut impl Read) -> Result<FlatIndexHeader, HeaderError> {
    let mut fourcc = [0u8; 4];
    reader.read_exact(&mut fourcc)?;
    let metric = match &fourcc {
        b"IxFI" => FlatMetric::InnerProduct,
        b"IxF2" => FlatMetric::L2,
        other => {
            return Err(HeaderError::Unsupported(
                String::from_utf8_lossy(other).into_owned(),
            ));
        }
    };

    let dimension = read_i32(reader)?;
    let ntotal = read_i64(reader)?;
    let _reserved = (read_i64(reader)?, read_i64(reader)?);
    let mut is_trained = [0u8; 1];
    reader.read_exact(&mut is_trained)?;
    let _metric_type = read_i32(reader)?;

    let dimension = u32::try_from(dimension)
        .ok()
        .filter(|d| *d > 0)
        .ok_or_else(|| HeaderError::Malformed(format!("invalid dimension {dimension}")))?;
    let vectors = u64::try_from(ntotal)
        .map_err(|_| HeaderError::Malformed(format!("invalid vector count {ntotal}")))?;

    Ok(FlatIndexHeader {
        metric,
        dimension,
        vectors,
    })
}

fn read_i32(reader: &mut impl Read) -> std::io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_i64(reader: &mut impl Read) -> std::io::Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

#[cfg(test)]
pub(crate) fn header_bytes(fourcc: &[u8; 4], dimension: i32, ntotal: i64) -> Vec<u8> {
    let mut bytes = fourcc.to_vec();
    bytes.extend_from_slice(&dimension.to_le_bytes());
    bytes.extend_from_slice(&ntotal.to_le_bytes());
    bytes.extend_from_slice(&0i64.to_le_bytes());
    bytes.extend_from_slice(&(1i64 << 20).to_le_bytes());
    bytes.push(1);
    bytes.extend_from_slice(&1i32.to_le_bytes());
    bytes
}
