use std::fmt::Debug;

use crate::error::Result;

/// Trait for pluggable compute backends.
///
/// Every operation works on row-major f32 batches of `n_vocab`-wide rows, the
/// layout of a next-token distribution batch. Data is passed in as slices and
/// returned as owned vectors.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu").
    fn name(&self) -> &str;

    /// Log-softmax over chunks of `n_vocab` elements.
    ///
    /// For each chunk: result[i] = x[i] - log(sum(exp(x[j])))
    fn log_softmax(&self, x: &[f32], n_vocab: usize) -> Result<Vec<f32>>;

    /// Log-sum-exp of each chunk of `n_vocab` elements, one value per chunk.
    ///
    /// A row of valid log-probabilities has a log-sum-exp of zero.
    fn logsumexp_rows(&self, x: &[f32], n_vocab: usize) -> Result<Vec<f32>>;

    /// Adds a per-row offset to every element of that row:
    /// result[r * n_vocab + j] = x[r * n_vocab + j] + offsets[r].
    ///
    /// Used to turn next-token log-probabilities into cumulative candidate
    /// scores.
    fn add_row_offsets(&self, x: &[f32], offsets: &[f32], n_vocab: usize) -> Result<Vec<f32>>;
}
