use dr_tensor::Tensor;

use crate::special::SpecialTokens;

/// The capability a decoder needs from a model: next-token log-probabilities
/// for a batch of partial sequences.
///
/// Implementations must be deterministic for identical input and must return
/// one normalized log-probability row per input row.
pub trait ScoringModel: Send + Sync {
    /// Score a batch of partial sequences.
    ///
    /// - `sequences`: `U32` tensor of shape `[rows, length]`.
    /// - `origins`: for each row, the index of the input example it was
    ///   derived from. Encoder-decoder models use it to look up the source
    ///   they condition on; decoder-only models can ignore it.
    ///
    /// Returns an `F32` tensor of shape `[rows, vocab_size()]` holding the
    /// log-probability of every next token.
    fn score(&self, sequences: &Tensor, origins: &[usize]) -> crate::Result<Tensor>;

    /// Returns the vocabulary size (number of log-probabilities per row).
    fn vocab_size(&self) -> usize;

    /// Returns the reserved start, end, padding and unknown indices.
    fn special_tokens(&self) -> SpecialTokens;
}

/// Adapts a closure into a `ScoringModel`.
///
/// Handy for wrapping an external model runtime, or for scripted scorers.
pub struct FnModel<F> {
    vocab_size: usize,
    special: SpecialTokens,
    score_fn: F,
}

impl<F> FnModel<F>
where
    F: Fn(&Tensor, &[usize]) -> crate::Result<Tensor> + Send + Sync,
{
    pub fn new(vocab_size: usize, special: SpecialTokens, score_fn: F) -> Self {
        Self {
            vocab_size,
            special,
            score_fn,
        }
    }
}

impl<F> ScoringModel for FnModel<F>
where
    F: Fn(&Tensor, &[usize]) -> crate::Result<Tensor> + Send + Sync,
{
    fn score(&self, sequences: &Tensor, origins: &[usize]) -> crate::Result<Tensor> {
        (self.score_fn)(sequences, origins)
    }

    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn special_tokens(&self) -> SpecialTokens {
        self.special
    }
}
