//! Result assembly shared by every decoder: trims padding past the longest
//! generated sequence, ranks hypotheses and packs everything into tensors.

use std::cmp::Ordering;

use dr_tensor::{Shape, Tensor};

use crate::config::LengthNormalization;
use crate::error::Result;
use crate::output::{BeamDecoded, Completion, Decoded};

/// One sequence as it left the decoding loop.
#[derive(Debug, Clone)]
pub(crate) struct FinalSequence {
    /// Prefix followed by the generated tokens; no trailing padding.
    pub tokens: Vec<u32>,
    pub log_prob: f32,
    pub generated: usize,
    pub finished: bool,
}

/// Width of the output rows: the prefix plus the longest generation.
fn output_width<'a>(
    prefix_len: usize,
    sequences: impl Iterator<Item = &'a FinalSequence>,
) -> usize {
    prefix_len + sequences.map(|s| s.generated).max().unwrap_or(0)
}

fn push_padded(out: &mut Vec<u32>, tokens: &[u32], width: usize, pad: u32) {
    out.extend_from_slice(tokens);
    out.extend(std::iter::repeat(pad).take(width - tokens.len()));
}

pub(crate) fn assemble_single(
    sequences: Vec<FinalSequence>,
    prefix_len: usize,
    pad: u32,
    completion: Completion,
    steps: usize,
) -> Result<Decoded> {
    let batch = sequences.len();
    let width = output_width(prefix_len, sequences.iter());

    let mut tokens = Vec::with_capacity(batch * width);
    for s in &sequences {
        push_padded(&mut tokens, &s.tokens, width, pad);
    }

    Ok(Decoded {
        sequences: Tensor::from_tokens(tokens, Shape::matrix(batch, width)),
        log_probabilities: Tensor::new(
            sequences.iter().map(|s| s.log_prob).collect(),
            Shape::new(vec![batch]),
        ),
        finished: sequences.iter().map(|s| s.finished).collect(),
        generated: sequences.iter().map(|s| s.generated).collect(),
        prefix_length: prefix_len,
        pad,
        completion,
        steps,
    })
}

pub(crate) struct BeamLayout {
    pub beam_width: usize,
    pub normalization: LengthNormalization,
    pub prefix_len: usize,
    pub pad: u32,
}

/// Rank every beam by its (optionally length-normalized) score and pack the
/// result into `[batch, beam_width, ...]` tensors.
///
/// The sort is stable, so hypotheses with equal scores keep their beam order.
pub(crate) fn assemble_beams(
    beams: Vec<Vec<FinalSequence>>,
    layout: &BeamLayout,
    completion: Completion,
    steps: usize,
) -> Result<BeamDecoded> {
    let batch = beams.len();
    let k = layout.beam_width;
    let width = output_width(layout.prefix_len, beams.iter().flatten());

    let mut tokens = Vec::with_capacity(batch * k * width);
    let mut scores = Vec::with_capacity(batch * k);
    let mut log_probs = Vec::with_capacity(batch * k);
    let mut finished = Vec::with_capacity(batch * k);
    let mut generated = Vec::with_capacity(batch * k);
    let mut beam_sizes = Vec::with_capacity(batch);

    for beam in beams {
        let mut ranked: Vec<(f32, FinalSequence)> = beam
            .into_iter()
            .map(|s| (layout.normalization.apply(s.log_prob, s.generated), s))
            .collect();
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        ranked.truncate(k);
        beam_sizes.push(ranked.len());

        for (score, s) in &ranked {
            push_padded(&mut tokens, &s.tokens, width, layout.pad);
            scores.push(*score);
            log_probs.push(s.log_prob);
            finished.push(s.finished);
            generated.push(s.generated);
        }
        for _ in ranked.len()..k {
            push_padded(&mut tokens, &[], width, layout.pad);
            scores.push(f32::NEG_INFINITY);
            log_probs.push(f32::NEG_INFINITY);
            finished.push(false);
            generated.push(0);
        }
    }

    Ok(BeamDecoded {
        sequences: Tensor::from_tokens(tokens, Shape::new(vec![batch, k, width])),
        scores: Tensor::new(scores, Shape::matrix(batch, k)),
        log_probabilities: Tensor::new(log_probs, Shape::matrix(batch, k)),
        finished,
        generated,
        beam_sizes,
        prefix_length: layout.prefix_len,
        pad: layout.pad,
        completion,
        steps,
    })
}
