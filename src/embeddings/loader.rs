//! Embedding set loading and encoding selection.
//!
//! A set directory holds `tokens.json` plus one of two encodings:
//!
//! - plain: `embeddings.json`, a row-major matrix parallel to the token
//!   list; dimensionality is inferred from the first row
//! - packed: `embeddings.bin`, the flat vector buffer as little-endian
//!   fp32, described by `meta.json` (`{dims, count, format}`)
//!
//! [`load_table`] probes the preferred high-resolution set first and falls
//! back to the bundled sample set; within a set the packed encoding wins
//! when its metadata declares fp32 and the blob is present. The byte->float
//! decode of a full GloVe blob is tens of megabytes, so it runs on a
//! blocking worker while the caller awaits the join handle; the table is
//! never observable half-built.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{EmbeddingTable, TableError};

pub const TOKENS_FILE: &str = "tokens.json";
pub const MATRIX_FILE: &str = "embeddings.json";
pub const VECTORS_FILE: &str = "embeddings.bin";
pub const META_FILE: &str = "meta.json";

/// Preferred high-resolution set, probed first.
pub const PREFERRED_SET: &str = "glove50";
/// Bundled fallback set.
pub const SAMPLE_SET: &str = "sample";

/// Packed-encoding metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetMeta {
    pub dims: usize,
    pub count: usize,
    pub format: VectorFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorFormat {
    Fp32,
    /// Known tag with no decode path; sets declaring it load via the plain
    /// encoding.
    Int8,
}

/// Load the best available embedding set under `root`.
///
/// Any failure in the preferred set logs a warning and falls through to the
/// sample set; when the sample set fails too there is no further fallback
/// and the error is terminal.
pub async fn load_table(root: &Path) -> Result<EmbeddingTable, TableError> {
    let preferred = root.join(PREFERRED_SET);
    if preferred.join(META_FILE).is_file() {
        match load_set(&preferred).await {
            Ok(table) => return Ok(table),
            Err(err) => {
                warn!(set = %preferred.display(), error = %err, "preferred set unusable, falling back");
            }
        }
    }

    let sample = root.join(SAMPLE_SET);
    load_set(&sample)
        .await
        .map_err(|source| TableError::Unavailable {
            root: root.to_path_buf(),
            source: Box::new(source),
        })
}

/// Load one set directory, picking the packed encoding when available.
pub async fn load_set(dir: &Path) -> Result<EmbeddingTable, TableError> {
    match read_meta(dir) {
        Some(meta) if meta.format == VectorFormat::Fp32 && dir.join(VECTORS_FILE).is_file() => {
            load_packed(dir, meta).await
        }
        _ => load_plain(dir),
    }
}

fn read_meta(dir: &Path) -> Option<SetMeta> {
    match read_json::<SetMeta>(&dir.join(META_FILE)) {
        Ok(meta) => Some(meta),
        Err(err) => {
            debug!(set = %dir.display(), error = %err, "no usable set metadata");
            None
        }
    }
}

fn load_plain(dir: &Path) -> Result<EmbeddingTable, TableError> {
    let tokens: Vec<String> = read_json(&dir.join(TOKENS_FILE))?;
    let matrix: Vec<Vec<f32>> = read_json(&dir.join(MATRIX_FILE))?;
    if matrix.len() != tokens.len() {
        return Err(TableError::Malformed {
            reason: format!("{} tokens but {} matrix rows", tokens.len(), matrix.len()),
        });
    }

    let dims = matrix.first().map_or(0, Vec::len);
    let mut components = Vec::with_capacity(tokens.len() * dims);
    for (row, vector) in matrix.iter().enumerate() {
        if vector.len() != dims {
            return Err(TableError::Malformed {
                reason: format!(
                    "matrix row {row} has {} components, expected {dims}",
                    vector.len()
                ),
            });
        }
        components.extend_from_slice(vector);
    }

    let table = EmbeddingTable::new(tokens, dims, components)?;
    info!(set = %dir.display(), tokens = table.len(), dims = table.dims(), "loaded plain embedding set");
    Ok(table)
}

async fn load_packed(dir: &Path, meta: SetMeta) -> Result<EmbeddingTable, TableError> {
    let tokens: Vec<String> = read_json(&dir.join(TOKENS_FILE))?;
    if tokens.len() != meta.count {
        return Err(TableError::Malformed {
            reason: format!(
                "metadata declares {} rows but token list has {}",
                meta.count,
                tokens.len()
            ),
        });
    }

    let bin_path = dir.join(VECTORS_FILE);
    let dims = meta.dims;
    let decode_path = bin_path.clone();
    let components = tokio::task::spawn_blocking(move || decode_fp32_blob(&decode_path, dims))
        .await
        .map_err(|err| TableError::Io {
            path: bin_path,
            source: std::io::Error::other(err),
        })??;

    if components.len() != meta.count * meta.dims {
        return Err(TableError::Malformed {
            reason: format!(
                "blob holds {} components, metadata declares {}x{}",
                components.len(),
                meta.count,
                meta.dims
            ),
        });
    }

    let table = EmbeddingTable::new(tokens, dims, components)?;
    info!(set = %dir.display(), tokens = table.len(), dims = table.dims(), "loaded packed embedding set");
    Ok(table)
}

/// Reinterpret a raw blob as little-endian fp32 components.
fn decode_fp32_blob(path: &Path, dims: usize) -> Result<Vec<f32>, TableError> {
    let file = File::open(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let bytes = &mmap[..];

    if bytes.len() % 4 != 0 {
        return Err(TableError::Malformed {
            reason: format!("blob of {} bytes is not whole fp32 components", bytes.len()),
        });
    }
    let floats = bytes.len() / 4;
    if dims == 0 || floats % dims != 0 {
        return Err(TableError::Malformed {
            reason: format!("{floats} components do not divide into rows of {dims}"),
        });
    }

    let mut components = Vec::with_capacity(floats);
    for chunk in bytes.chunks_exact(4) {
        components.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(components)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, TableError> {
    let bytes = std::fs::read(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| TableError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
