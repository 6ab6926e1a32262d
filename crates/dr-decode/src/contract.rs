//! Enforcement of the scoring contract: one normalized log-probability row
//! per input row, every entry finite or `-inf`.

use dr_model::ScoringModel;
use dr_tensor::{ComputeBackend, Tensor};
use log::debug;

use crate::error::{ContractViolation, Result};

/// Largest accepted distance of a row's log-sum-exp from zero.
pub const NORMALIZATION_TOLERANCE: f32 = 1e-3;

/// Call the model and reject any output that breaks the contract.
///
/// Violations are returned immediately; a deterministic scorer would only
/// repeat them.
pub fn score_checked<M: ScoringModel + ?Sized>(
    model: &M,
    backend: &dyn ComputeBackend,
    sequences: &Tensor,
    origins: &[usize],
) -> Result<Tensor> {
    let rows = sequences.rows()?;
    let log_probs = model.score(sequences, origins)?;
    if let Err(violation) = validate_log_probs(&log_probs, rows, model.vocab_size(), backend) {
        debug!("scoring contract violation: {}", violation);
        return Err(violation.into());
    }
    Ok(log_probs)
}

/// Check shape, element type, finiteness and normalization of a scorer output.
pub fn validate_log_probs(
    log_probs: &Tensor,
    rows: usize,
    n_vocab: usize,
    backend: &dyn ComputeBackend,
) -> std::result::Result<(), ContractViolation> {
    if log_probs.shape().dims() != [rows, n_vocab] {
        return Err(ContractViolation::Shape {
            expected: vec![rows, n_vocab],
            got: log_probs.shape().dims().to_vec(),
        });
    }
    let data = log_probs
        .data_f32()
        .map_err(|_| ContractViolation::DType(log_probs.dtype()))?;
    if let Some(i) = data.iter().position(|v| v.is_nan() || *v == f32::INFINITY) {
        return Err(ContractViolation::NotFinite {
            row: i / n_vocab,
            token: i % n_vocab,
            value: data[i],
        });
    }
    if rows == 0 {
        return Ok(());
    }
    let masses = backend
        .logsumexp_rows(data, n_vocab)
        .map_err(|_| ContractViolation::Shape {
            expected: vec![rows, n_vocab],
            got: log_probs.shape().dims().to_vec(),
        })?;
    for (row, &log_mass) in masses.iter().enumerate() {
        // Written so that a -inf or NaN mass also fails.
        if !(log_mass.abs() <= NORMALIZATION_TOLERANCE) {
            return Err(ContractViolation::Unnormalized { row, log_mass });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_tensor::{CpuBackend, Shape};

    fn check(
        t: &Tensor,
        rows: usize,
        n_vocab: usize,
    ) -> std::result::Result<(), ContractViolation> {
        validate_log_probs(t, rows, n_vocab, &CpuBackend::new())
    }

    #[test]
    fn test_accepts_valid_rows() {
        let half = 0.5f32.ln();
        let t = Tensor::from_f32_rows(&[
            vec![half, half, f32::NEG_INFINITY],
            vec![0.0, f32::NEG_INFINITY, f32::NEG_INFINITY],
        ])
        .unwrap();
        assert!(check(&t, 2, 3).is_ok());
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let t = Tensor::zeros(Shape::matrix(2, 4));
        assert!(matches!(
            check(&t, 2, 3),
            Err(ContractViolation::Shape { expected, got })
                if expected == vec![2, 3] && got == vec![2, 4]
        ));
        assert!(matches!(check(&t, 3, 4), Err(ContractViolation::Shape { .. })));
    }

    #[test]
    fn test_rejects_token_tensor() {
        let t = Tensor::from_token_rows(&[vec![0, 0]]).unwrap();
        assert!(matches!(check(&t, 1, 2), Err(ContractViolation::DType(_))));
    }

    #[test]
    fn test_rejects_nan_and_positive_infinity() {
        let t = Tensor::from_f32_rows(&[vec![0.0, f32::NAN]]).unwrap();
        assert!(matches!(
            check(&t, 1, 2),
            Err(ContractViolation::NotFinite { row: 0, token: 1, .. })
        ));
        let t = Tensor::from_f32_rows(&[vec![f32::INFINITY, 0.0]]).unwrap();
        assert!(matches!(check(&t, 1, 2), Err(ContractViolation::NotFinite { .. })));
    }

    #[test]
    fn test_rejects_unnormalized_rows() {
        // Raw logits instead of log-probabilities.
        let t = Tensor::from_f32_rows(&[vec![0.0, 0.0], vec![1.0, 2.0]]).unwrap();
        assert!(matches!(
            check(&t, 2, 2),
            Err(ContractViolation::Unnormalized { row: 0, .. })
        ));
        let t = Tensor::from_f32_rows(&[vec![f32::NEG_INFINITY, f32::NEG_INFINITY]]).unwrap();
        assert!(matches!(check(&t, 1, 2), Err(ContractViolation::Unnormalized { .. })));
    }
}
