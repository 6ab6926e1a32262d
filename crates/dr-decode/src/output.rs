use dr_tensor::Tensor;

use crate::assemble::{assemble_single, FinalSequence};
use crate::error::{DecodeError, Result};

fn no_example(i: usize, batch: usize) -> DecodeError {
    DecodeError::Other(format!("example {} out of range for batch of {}", i, batch))
}

/// How a decoding loop ended.
///
/// `Truncated` and `Cancelled` are reported, not raised: the output still
/// holds the best sequences found, with per-sequence finished flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every sequence emitted the end marker (or started with one).
    Finished,
    /// `max_length` was reached with unfinished sequences left.
    Truncated,
    /// The cancellation check fired before every sequence finished.
    Cancelled,
}

impl Completion {
    pub fn is_finished(&self) -> bool {
        matches!(self, Completion::Finished)
    }
}

/// Output of the single-hypothesis decoders (greedy search and sampling).
#[derive(Debug, Clone)]
pub struct Decoded {
    /// `U32 [batch, length]`: prefix, generated tokens, then padding.
    pub sequences: Tensor,
    /// `F32 [batch]`: summed log-probability of the generated tokens.
    pub log_probabilities: Tensor,
    /// Per example: whether the end marker was reached.
    pub finished: Vec<bool>,
    /// Per example: number of generated tokens (end marker included).
    pub generated: Vec<usize>,
    /// Length of the prefixes the search started from.
    pub prefix_length: usize,
    /// Index used to fill positions after a sequence ended.
    pub pad: u32,
    pub completion: Completion,
    /// Decoding steps actually run.
    pub steps: usize,
}

impl Decoded {
    pub fn batch_size(&self) -> usize {
        self.finished.len()
    }

    /// Prefix and generated tokens of example `i`, without trailing padding.
    pub fn sequence(&self, i: usize) -> Result<&[u32]> {
        let row = self.sequences.row_u32(i)?;
        Ok(&row[..self.prefix_length + self.generated[i]])
    }

    pub fn log_probability(&self, i: usize) -> Result<f32> {
        self.log_probabilities
            .data_f32()?
            .get(i)
            .copied()
            .ok_or_else(|| no_example(i, self.batch_size()))
    }
}

/// A finalized beam hypothesis.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    /// Prefix and generated tokens, without trailing padding.
    pub tokens: Vec<u32>,
    /// Cumulative log-probability of the generated tokens.
    pub log_probability: f32,
    /// Ranking score (the log-probability, length-normalized if configured).
    pub score: f32,
    pub finished: bool,
}

/// Output of beam search.
///
/// Every example owns `beam_width` slots, best first. Examples that end with
/// fewer hypotheses have their remaining slots filled with padding and a
/// score of negative infinity.
#[derive(Debug, Clone)]
pub struct BeamDecoded {
    /// `U32 [batch, beam_width, length]`.
    pub sequences: Tensor,
    /// `F32 [batch, beam_width]`: ranking scores, non-increasing per example.
    pub scores: Tensor,
    /// `F32 [batch, beam_width]`: raw cumulative log-probabilities.
    pub log_probabilities: Tensor,
    /// `[batch * beam_width]` finished flags.
    pub finished: Vec<bool>,
    /// `[batch * beam_width]` generated token counts.
    pub generated: Vec<usize>,
    /// Number of filled slots per example.
    pub beam_sizes: Vec<usize>,
    pub prefix_length: usize,
    pub pad: u32,
    pub completion: Completion,
    pub steps: usize,
}

impl BeamDecoded {
    pub fn batch_size(&self) -> usize {
        self.beam_sizes.len()
    }

    pub fn beam_width(&self) -> usize {
        self.sequences.shape().dim(1)
    }

    /// The ranked hypotheses of example `i`.
    pub fn hypotheses(&self, i: usize) -> Result<Vec<Hypothesis>> {
        let size = *self
            .beam_sizes
            .get(i)
            .ok_or_else(|| no_example(i, self.batch_size()))?;
        let k = self.beam_width();
        let len = self.sequences.shape().dim(2);
        let tokens = self.sequences.data_u32()?;
        let scores = self.scores.data_f32()?;
        let log_probs = self.log_probabilities.data_f32()?;

        Ok((0..size)
            .map(|j| {
                let slot = i * k + j;
                let start = slot * len;
                Hypothesis {
                    tokens: tokens[start..start + self.prefix_length + self.generated[slot]]
                        .to_vec(),
                    log_probability: log_probs[slot],
                    score: scores[slot],
                    finished: self.finished[slot],
                }
            })
            .collect())
    }

    /// Keep only the top-ranked hypothesis of every example.
    pub fn best(&self) -> Result<Decoded> {
        let mut best = Vec::with_capacity(self.batch_size());
        for i in 0..self.batch_size() {
            let h = self
                .hypotheses(i)?
                .into_iter()
                .next()
                .ok_or_else(|| DecodeError::Other(format!("example {} holds no hypothesis", i)))?;
            best.push(FinalSequence {
                generated: h.tokens.len() - self.prefix_length,
                tokens: h.tokens,
                log_prob: h.log_probability,
                finished: h.finished,
            });
        }
        assemble_single(best, self.prefix_length, self.pad, self.completion, self.steps)
    }
}
