use dr_model::ScoringModel;
use dr_tensor::{ComputeBackend, Tensor};
use log::{debug, trace};
use rand::RngCore;

use crate::assemble::{assemble_single, FinalSequence};
use crate::cancel::Cancellation;
use crate::contract::score_checked;
use crate::error::{DecodeError, Result};
use crate::output::{Completion, Decoded};
use crate::sampler::SamplerChain;

use super::{cancelled, check_inputs, is_terminated};

/// Everything a single-hypothesis search needs besides the model.
pub(crate) struct SingleSearch<'a> {
    pub backend: &'a dyn ComputeBackend,
    pub cancellation: Option<&'a dyn Cancellation>,
    pub max_length: usize,
    /// Picks one token per row of log-probabilities.
    pub chain: &'a SamplerChain,
}

/// Advance one hypothesis per example until every example has emitted the
/// end marker, `max_length` tokens were added, or the search was cancelled.
///
/// Only unfinished examples are sent to the model; finished ones receive the
/// padding index so the batch keeps a rectangular shape.
pub(crate) fn run<M: ScoringModel + ?Sized>(
    model: &M,
    initial: &Tensor,
    search: &SingleSearch<'_>,
    rng: &mut dyn RngCore,
) -> Result<Decoded> {
    let prefixes = check_inputs(model, initial)?;
    let special = model.special_tokens();
    let batch = prefixes.batch;

    let mut tokens = initial.clone();
    let mut finished = (0..batch)
        .map(|r| Ok(is_terminated(initial.row_u32(r)?, &special)))
        .collect::<Result<Vec<bool>>>()?;
    let mut log_probs = vec![0.0f32; batch];
    let mut generated = vec![0usize; batch];
    let mut steps = 0;
    let mut was_cancelled = false;

    debug!(
        "single-hypothesis search: batch={}, max_length={}, samplers={:?}",
        batch,
        search.max_length,
        search.chain.names()
    );

    for step in 0..search.max_length {
        let active: Vec<usize> = (0..batch).filter(|&r| !finished[r]).collect();
        if active.is_empty() {
            break;
        }
        if cancelled(search.cancellation) {
            was_cancelled = true;
            break;
        }

        let scores = score_checked(model, search.backend, &tokens.select_rows(&active)?, &active)?;

        let mut column = vec![special.pad; batch];
        for (i, &r) in active.iter().enumerate() {
            let row = scores.row_f32(i)?;
            let token = search.chain.sample(row, rng).ok_or_else(|| {
                DecodeError::Other(format!("sampler chain selected no token for row {}", r))
            })?;
            column[r] = token;
            log_probs[r] += row[token as usize];
            generated[r] += 1;
            if token == special.end {
                finished[r] = true;
            }
        }
        tokens = tokens.append_column(&column)?;
        steps += 1;
        trace!("step {}: {} active rows", step, active.len());
    }

    let completion = if finished.iter().all(|&f| f) {
        Completion::Finished
    } else if was_cancelled {
        Completion::Cancelled
    } else {
        Completion::Truncated
    };
    debug!("single-hypothesis search ended after {} steps: {:?}", steps, completion);

    let sequences = (0..batch)
        .map(|r| {
            let row = tokens.row_u32(r)?;
            Ok(FinalSequence {
                tokens: row[..prefixes.len + generated[r]].to_vec(),
                log_prob: log_probs[r],
                generated: generated[r],
                finished: finished[r],
            })
        })
        .collect::<Result<Vec<_>>>()?;

    assemble_single(sequences, prefixes.len, special.pad, completion, steps)
}
