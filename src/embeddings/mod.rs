//! Embedding table: lowercase token index over a flat vector slab.
//!
//! A table is built once by the [`loader`] and is read-only afterwards, so
//! it can be shared freely (`Arc`) without synchronization. Lookups go
//! through the lowercase index; display uses the original token casing.

pub mod loader;
pub mod scale;
mod store;

pub use loader::{SetMeta, VectorFormat, load_set, load_table};
pub use store::VectorStore;

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from table loading and row access.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("row {row} out of bounds for table of {count} rows")]
    OutOfRange { row: usize, count: usize },

    #[error("malformed embedding set: {reason}")]
    Malformed { reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no usable embedding set under {root}")]
    Unavailable {
        root: PathBuf,
        #[source]
        source: Box<TableError>,
    },
}

/// Lowercase token -> row number.
///
/// Built once from the full token list. Two tokens that normalize to the
/// same lowercase key keep the later row (plain replace-on-insert).
#[derive(Debug, Default)]
pub struct TokenIndex {
    rows: HashMap<String, usize>,
}

impl TokenIndex {
    pub fn build(tokens: &[String]) -> Self {
        let mut rows = HashMap::with_capacity(tokens.len());
        for (row, token) in tokens.iter().enumerate() {
            rows.insert(token.to_lowercase(), row);
        }
        Self { rows }
    }

    pub fn lookup(&self, word: &str) -> Option<usize> {
        self.rows.get(&word.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Immutable token/vector table plus its lookup index.
#[derive(Debug)]
pub struct EmbeddingTable {
    tokens: Vec<String>,
    index: TokenIndex,
    vectors: VectorStore,
}

impl EmbeddingTable {
    /// Assemble a table from parallel tokens and a flat row-major buffer.
    ///
    /// The buffer must hold exactly `tokens.len()` rows of `dims`
    /// components.
    pub fn new(tokens: Vec<String>, dims: usize, components: Vec<f32>) -> Result<Self, TableError> {
        let vectors = VectorStore::new(dims, components)?;
        if vectors.rows() != tokens.len() {
            return Err(TableError::Malformed {
                reason: format!(
                    "{} tokens but {} vector rows",
                    tokens.len(),
                    vectors.rows()
                ),
            });
        }
        let index = TokenIndex::build(&tokens);
        Ok(Self {
            tokens,
            index,
            vectors,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Vector dimensionality, constant for the whole table.
    pub fn dims(&self) -> usize {
        self.vectors.dims()
    }

    /// Token at `row` in its original casing.
    pub fn token(&self, row: usize) -> Option<&str> {
        self.tokens.get(row).map(String::as_str)
    }

    /// Case-insensitive word -> row.
    pub fn lookup(&self, word: &str) -> Option<usize> {
        self.index.lookup(word)
    }

    /// Borrow the vector for `row`.
    pub fn row(&self, row: usize) -> Result<&[f32], TableError> {
        self.vectors.row(row)
    }

    /// Euclidean distance between rows `a` and `b`.
    pub fn distance(&self, a: usize, b: usize) -> Result<f64, TableError> {
        store::l2_distance(&self.vectors, a, b)
    }
}
