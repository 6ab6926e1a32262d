//! The decoding loops. Greedy search and sampling share the single-hypothesis
//! loop in `single`; beam search advances a `BeamState` per step.

pub(crate) mod beam;
pub(crate) mod beam_state;
pub(crate) mod single;

use dr_model::{last_token, ScoringModel, SpecialTokens};
use dr_tensor::{DType, Tensor};

use crate::cancel::Cancellation;
use crate::error::{DecodeError, Result};

/// Shape of a validated prefix batch.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Prefixes {
    pub batch: usize,
    pub len: usize,
}

/// Check the model metadata and the initial sequences before any model call.
pub(crate) fn check_inputs<M: ScoringModel + ?Sized>(
    model: &M,
    initial: &Tensor,
) -> Result<Prefixes> {
    let n_vocab = model.vocab_size();
    if n_vocab == 0 {
        return Err(DecodeError::InvalidConfiguration(
            "model reports an empty vocabulary".to_string(),
        ));
    }
    model
        .special_tokens()
        .validate(n_vocab)
        .map_err(|e| DecodeError::InvalidConfiguration(e.to_string()))?;

    if initial.dtype() != DType::U32 {
        return Err(DecodeError::InvalidConfiguration(format!(
            "initial sequences must hold u32 token indices, got {}",
            initial.dtype()
        )));
    }
    let (batch, len) = initial.shape().as_matrix().map_err(|_| {
        DecodeError::InvalidConfiguration(format!(
            "initial sequences must be [batch, length], got {}",
            initial.shape()
        ))
    })?;
    if let Some(&bad) = initial.data_u32()?.iter().find(|&&t| t as usize >= n_vocab) {
        return Err(DecodeError::InvalidConfiguration(format!(
            "initial token {} outside vocabulary of size {}",
            bad, n_vocab
        )));
    }
    Ok(Prefixes { batch, len })
}

/// True if the sequence already ends with the end marker (ignoring padding).
pub(crate) fn is_terminated(sequence: &[u32], special: &SpecialTokens) -> bool {
    last_token(sequence, special.pad) == Some(special.end)
}

pub(crate) fn cancelled(cancellation: Option<&dyn Cancellation>) -> bool {
    cancellation.is_some_and(|c| c.is_cancelled())
}
