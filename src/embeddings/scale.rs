//! Display-scale estimation by bounded random sampling.
//!
//! The ratio bar needs a per-prompt normalization scale. Sampling a bounded
//! pool and taking the max observed distance is a heuristic upper bound; it
//! may under- or over-shoot the true maximum and that is fine for display.

use rand::Rng;

use super::EmbeddingTable;

/// Upper bound on rows sampled per estimate.
pub const SAMPLE_CAP: usize = 1024;

/// Estimate the normalization scale for the prompt at `exclude`.
///
/// `pool` restricts the sampling universe to those rows (the whole table
/// when `None`); `exclude` is removed before sampling so the prompt is
/// never measured against itself. Draws `min(1024, |filtered pool|)` rows
/// uniformly without replacement and returns the maximum distance from the
/// prompt, or `None` when the filtered pool is empty or a row falls outside
/// the table.
pub fn estimate_scale<R: Rng>(
    table: &EmbeddingTable,
    pool: Option<&[usize]>,
    exclude: usize,
    rng: &mut R,
) -> Option<f64> {
    let candidates: Vec<usize> = match pool {
        Some(rows) => rows.iter().copied().filter(|&row| row != exclude).collect(),
        None => (0..table.len()).filter(|&row| row != exclude).collect(),
    };
    let sampled = sample_without_replacement(candidates, SAMPLE_CAP, rng);
    if sampled.is_empty() {
        return None;
    }

    let mut max = 0.0f64;
    for row in sampled {
        let d = match table.distance(exclude, row) {
            Ok(d) => d,
            Err(_) => return None,
        };
        if d > max {
            max = d;
        }
    }
    Some(max)
}

/// Uniform sample without replacement via partial Fisher-Yates.
///
/// After `i` swaps the prefix `[0, i]` is a uniform draw from the whole
/// vector, so only `min(cap, len)` swaps are needed.
fn sample_without_replacement<R: Rng>(
    mut candidates: Vec<usize>,
    cap: usize,
    rng: &mut R,
) -> Vec<usize> {
    let take = candidates.len().min(cap);
    for i in 0..take {
        let j = rng.gen_range(i..candidates.len());
        candidates.swap(i, j);
    }
    candidates.truncate(take);
    candidates
}
