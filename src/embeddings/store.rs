//! Flat row-major vector storage and the L2 distance kernel.

use super::TableError;

/// One contiguous `f32` buffer holding every vector; row `i` occupies
/// `[i*dims, (i+1)*dims)`. No per-row allocation, no mutation after
/// construction.
#[derive(Debug)]
pub struct VectorStore {
    dims: usize,
    components: Vec<f32>,
}

impl VectorStore {
    pub(crate) fn new(dims: usize, components: Vec<f32>) -> Result<Self, TableError> {
        if dims == 0 {
            return Err(TableError::Malformed {
                reason: "vector dimensionality is zero".to_string(),
            });
        }
        if components.len() % dims != 0 {
            return Err(TableError::Malformed {
                reason: format!(
                    "buffer of {} components does not divide into rows of {dims}",
                    components.len()
                ),
            });
        }
        Ok(Self { dims, components })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn rows(&self) -> usize {
        self.components.len() / self.dims
    }

    /// Borrow row `i` as a `&[f32]` of length `dims`.
    pub fn row(&self, i: usize) -> Result<&[f32], TableError> {
        let count = self.rows();
        if i >= count {
            return Err(TableError::OutOfRange { row: i, count });
        }
        let start = i * self.dims;
        Ok(&self.components[start..start + self.dims])
    }
}

/// Euclidean distance between rows `a` and `b`.
///
/// Components are stored as `f32` but the sum of squares accumulates in
/// `f64`; with hundreds of dimensions an `f32` accumulator loses digits to
/// cancellation.
pub fn l2_distance(store: &VectorStore, a: usize, b: usize) -> Result<f64, TableError> {
    let va = store.row(a)?;
    let vb = store.row(b)?;
    let mut acc = 0.0f64;
    for (x, y) in va.iter().zip(vb) {
        let d = f64::from(*x) - f64::from(*y);
        acc += d * d;
    }
    Ok(acc.sqrt())
}
