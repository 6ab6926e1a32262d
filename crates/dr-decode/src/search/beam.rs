use dr_model::ScoringModel;
use dr_tensor::{ComputeBackend, Tensor};
use log::{debug, trace};

use crate::assemble::{assemble_beams, BeamLayout};
use crate::cancel::Cancellation;
use crate::config::BeamConfig;
use crate::contract::score_checked;
use crate::error::Result;
use crate::output::{BeamDecoded, Completion};

use super::beam_state::{BeamState, Expansion, Pruning};
use super::{cancelled, check_inputs};

/// Keep `beam_width` hypotheses per example, extending all of them each step
/// and pruning the union of their extensions back to `beam_width`.
///
/// An example stops expanding once every hypothesis it holds has emitted the
/// end marker. The search ends when all examples have stopped, after
/// `max_length` steps, or on cancellation.
pub(crate) fn run<M: ScoringModel + ?Sized>(
    model: &M,
    initial: &Tensor,
    config: &BeamConfig,
    backend: &dyn ComputeBackend,
    cancellation: Option<&dyn Cancellation>,
) -> Result<BeamDecoded> {
    config.validate()?;
    let prefixes = check_inputs(model, initial)?;
    let special = model.special_tokens();
    let n_vocab = model.vocab_size();
    let pruning = Pruning {
        beam_width: config.beam_width,
        branching_factor: config.branching_factor,
    };

    debug!(
        "beam search: batch={}, beam_width={}, branching_factor={:?}, max_length={}",
        prefixes.batch, config.beam_width, config.branching_factor, config.max_length
    );

    let mut state = BeamState::initial(initial, &special)?;
    let mut steps = 0;
    let mut was_cancelled = false;

    for step in 0..config.max_length {
        if state.all_frozen() {
            break;
        }
        if cancelled(cancellation) {
            was_cancelled = true;
            break;
        }

        let (rows, origins) = state.expanding_rows();
        let batch = state.tokens().select_rows(&rows)?;
        let log_probs = score_checked(model, backend, &batch, &origins)?;
        let log_probs = log_probs.data_f32()?;
        let offsets: Vec<f32> = rows.iter().map(|&r| state.scores()[r]).collect();
        let totals = backend.add_row_offsets(log_probs, &offsets, n_vocab)?;

        state = state.advance(
            &Expansion {
                rows: &rows,
                log_probs,
                totals: &totals,
                n_vocab,
            },
            pruning,
            &special,
        )?;
        steps += 1;
        trace!(
            "step {}: expanded {} hypotheses, {} of {} examples done",
            step,
            rows.len(),
            state.frozen_count(),
            prefixes.batch
        );
    }

    let completion = if state.all_frozen() {
        Completion::Finished
    } else if was_cancelled {
        Completion::Cancelled
    } else {
        Completion::Truncated
    };
    debug!("beam search ended after {} steps: {:?}", steps, completion);

    let layout = BeamLayout {
        beam_width: config.beam_width,
        normalization: config.length_normalization,
        prefix_len: prefixes.len,
        pad: special.pad,
    };
    assemble_beams(state.into_sequences(prefixes.len)?, &layout, completion, steps)
}
