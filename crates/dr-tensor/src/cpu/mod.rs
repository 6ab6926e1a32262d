use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};

/// Pure-Rust CPU compute backend.
///
/// Implements all operations with straightforward loops optimized for
/// correctness rather than peak performance. Intended as a reference
/// implementation and fallback.
#[derive(Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn check_rows(op: &str, x: &[f32], n_vocab: usize) -> Result<usize> {
    if n_vocab == 0 {
        return Err(TensorError::Other(format!("{}: n_vocab must be > 0", op)));
    }
    if x.len() % n_vocab != 0 {
        return Err(TensorError::Other(format!(
            "{}: x.len()={} is not a multiple of n_vocab={}",
            op,
            x.len(),
            n_vocab
        )));
    }
    Ok(x.len() / n_vocab)
}

/// Log-sum-exp of one row, accumulated in f64.
///
/// Returns negative infinity for a row with no probability mass.
fn row_logsumexp(row: &[f32]) -> f64 {
    let max_val = row.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    if max_val == f64::NEG_INFINITY || max_val.is_nan() {
        return max_val;
    }
    let sum: f64 = row.iter().map(|&v| (v as f64 - max_val).exp()).sum();
    max_val + sum.ln()
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn log_softmax(&self, x: &[f32], n_vocab: usize) -> Result<Vec<f32>> {
        let n_rows = check_rows("log_softmax", x, n_vocab)?;
        let mut result = Vec::with_capacity(x.len());

        for row in 0..n_rows {
            let row_data = &x[row * n_vocab..(row + 1) * n_vocab];
            let lse = row_logsumexp(row_data);
            if !lse.is_finite() {
                return Err(TensorError::Other(format!(
                    "log_softmax: row {} has log-sum-exp {}",
                    row, lse
                )));
            }
            result.extend(row_data.iter().map(|&v| (v as f64 - lse) as f32));
        }

        Ok(result)
    }

    fn logsumexp_rows(&self, x: &[f32], n_vocab: usize) -> Result<Vec<f32>> {
        let n_rows = check_rows("logsumexp_rows", x, n_vocab)?;
        Ok((0..n_rows)
            .map(|row| row_logsumexp(&x[row * n_vocab..(row + 1) * n_vocab]) as f32)
            .collect())
    }

    fn add_row_offsets(&self, x: &[f32], offsets: &[f32], n_vocab: usize) -> Result<Vec<f32>> {
        let n_rows = check_rows("add_row_offsets", x, n_vocab)?;
        if offsets.len() != n_rows {
            return Err(TensorError::ShapeMismatch {
                expected: vec![n_rows],
                got: vec![offsets.len()],
            });
        }
        Ok(x.chunks(n_vocab)
            .zip(offsets)
            .flat_map(|(row, &offset)| row.iter().map(move |&v| v + offset))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn backend() -> CpuBackend {
        CpuBackend::new()
    }

    #[test]
    fn test_log_softmax_normalizes() {
        let b = backend();
        let r = b.log_softmax(&[1.0, 2.0, 3.0, 0.0, 0.0, 0.0], 3).unwrap();
        let sum: f32 = r[..3].iter().map(|v| v.exp()).sum();
        assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-6);
        assert!(r[0] < r[1] && r[1] < r[2]);
        // A uniform row becomes log(1/3) everywhere.
        for v in &r[3..] {
            assert_abs_diff_eq!(*v, (1.0f32 / 3.0).ln(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_log_softmax_keeps_impossible_tokens() {
        let b = backend();
        let r = b.log_softmax(&[0.0, f32::NEG_INFINITY], 2).unwrap();
        assert_abs_diff_eq!(r[0], 0.0, epsilon = 1e-7);
        assert_eq!(r[1], f32::NEG_INFINITY);
    }

    #[test]
    fn test_log_softmax_rejects_empty_mass() {
        let b = backend();
        assert!(b
            .log_softmax(&[f32::NEG_INFINITY, f32::NEG_INFINITY], 2)
            .is_err());
    }

    #[test]
    fn test_logsumexp_rows() {
        let b = backend();
        let half = 0.5f32.ln();
        let r = b
            .logsumexp_rows(&[half, half, 0.0, f32::NEG_INFINITY], 2)
            .unwrap();
        assert_eq!(r.len(), 2);
        assert_abs_diff_eq!(r[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(r[1], 0.0, epsilon = 1e-6);

        let empty = b
            .logsumexp_rows(&[f32::NEG_INFINITY, f32::NEG_INFINITY], 2)
            .unwrap();
        assert_eq!(empty[0], f32::NEG_INFINITY);
    }

    #[test]
    fn test_add_row_offsets() {
        let b = backend();
        let r = b
            .add_row_offsets(&[-1.0, -2.0, -3.0, -4.0], &[-0.5, -1.0], 2)
            .unwrap();
        assert_eq!(r, vec![-1.5, -2.5, -4.0, -5.0]);
        assert!(b.add_row_offsets(&[0.0, 0.0], &[1.0, 2.0], 2).is_err());
    }

    #[test]
    fn test_row_length_mismatch() {
        let b = backend();
        assert!(b.log_softmax(&[1.0, 2.0, 3.0], 2).is_err());
        assert!(b.logsumexp_rows(&[1.0], 0).is_err());
    }
}
