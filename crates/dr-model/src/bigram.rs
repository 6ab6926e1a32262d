use dr_tensor::{ComputeBackend, Shape, Tensor};
use log::debug;

use crate::error::{ModelError, Result};
use crate::scorer::ScoringModel;
use crate::special::{last_token, SpecialTokens};

/// A bigram language model: the next-token distribution depends only on the
/// last non-padding token of the sequence.
///
/// Rows of the transition table are normalized with a log-softmax when the
/// model is built, so `score` is a plain table lookup. An empty sequence is
/// scored as if it held only the start token.
pub struct BigramModel {
    n_vocab: usize,
    special: SpecialTokens,
    /// Row-major `[n_vocab, n_vocab]` log-probabilities; row = previous token.
    log_probs: Vec<f32>,
}

impl BigramModel {
    /// Build a bigram model from unnormalized transition logits.
    ///
    /// - `logits`: row-major `[n_vocab, n_vocab]`; row `p` holds the logits
    ///   of every token following `p`. `-inf` marks an impossible transition.
    pub fn from_logits(
        logits: &[f32],
        n_vocab: usize,
        special: SpecialTokens,
        backend: &dyn ComputeBackend,
    ) -> Result<BigramModel> {
        if logits.len() != n_vocab * n_vocab {
            return Err(ModelError::ShapeMismatch {
                expected: vec![n_vocab, n_vocab],
                got: vec![logits.len()],
            });
        }
        special.validate(n_vocab)?;

        let log_probs = backend.log_softmax(logits, n_vocab)?;
        debug!(
            "built bigram model: n_vocab={}, backend={}",
            n_vocab,
            backend.name()
        );

        Ok(BigramModel {
            n_vocab,
            special,
            log_probs,
        })
    }

    /// Log-probabilities of every token following `prev`.
    pub fn transitions(&self, prev: u32) -> Result<&[f32]> {
        let p = prev as usize;
        if p >= self.n_vocab {
            return Err(ModelError::UnknownIndex {
                index: prev,
                vocab_size: self.n_vocab,
            });
        }
        Ok(&self.log_probs[p * self.n_vocab..(p + 1) * self.n_vocab])
    }
}

impl ScoringModel for BigramModel {
    fn score(&self, sequences: &Tensor, _origins: &[usize]) -> Result<Tensor> {
        let rows = sequences.rows()?;
        let mut data = Vec::with_capacity(rows * self.n_vocab);
        for r in 0..rows {
            let prev =
                last_token(sequences.row_u32(r)?, self.special.pad).unwrap_or(self.special.start);
            data.extend_from_slice(self.transitions(prev)?);
        }
        Ok(Tensor::new(data, Shape::matrix(rows, self.n_vocab)))
    }

    fn vocab_size(&self) -> usize {
        self.n_vocab
    }

    fn special_tokens(&self) -> SpecialTokens {
        self.special
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use dr_tensor::CpuBackend;

    const NEG: f32 = f32::NEG_INFINITY;

    fn model() -> BigramModel {
        // 5 tokens: 0 pad, 1 start, 2 end, 3, 4. start -> 3 -> 4 -> end.
        #[rustfmt::skip]
        let logits = vec![
            0.0, 0.0, 0.0, 0.0, 0.0,
            NEG, NEG, NEG, 0.0, NEG,
            0.0, 0.0, 0.0, 0.0, 0.0,
            NEG, NEG, NEG, NEG, 0.0,
            NEG, NEG, 0.0, NEG, NEG,
        ];
        let special = SpecialTokens {
            unknown: 4,
            ..SpecialTokens::default()
        };
        BigramModel::from_logits(&logits, 5, special, &CpuBackend::new()).unwrap()
    }

    #[test]
    fn test_rows_are_normalized() {
        let m = model();
        let row = m.transitions(0).unwrap();
        let mass: f32 = row.iter().map(|v| v.exp()).sum();
        assert_abs_diff_eq!(mass, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(m.transitions(1).unwrap()[3], 0.0, epsilon = 1e-7);
    }

    #[test]
    fn test_score_uses_last_non_pad_token() {
        let m = model();
        let seqs = Tensor::from_token_rows(&[vec![1, 3], vec![1, 4], vec![3, 0]]).unwrap();
        let out = m.score(&seqs, &[0, 0, 0]).unwrap();
        assert_eq!(out.shape().dims(), &[3, 5]);
        assert_eq!(out.row_f32(0).unwrap()[4], 0.0);
        assert_eq!(out.row_f32(1).unwrap()[2], 0.0);
        assert_eq!(out.row_f32(2).unwrap()[4], 0.0);
    }

    #[test]
    fn test_empty_sequence_scored_from_start() {
        let m = model();
        let seqs = Tensor::from_token_rows(&[vec![]]).unwrap();
        let out = m.score(&seqs, &[0]).unwrap();
        assert_eq!(out.row_f32(0).unwrap()[3], 0.0);
    }

    #[test]
    fn test_wrong_table_size() {
        let err =
            BigramModel::from_logits(&[0.0; 3], 2, SpecialTokens::default(), &CpuBackend::new());
        assert!(matches!(err, Err(ModelError::ShapeMismatch { .. })));
    }
}
