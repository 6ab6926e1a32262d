use crate::sampler::{Sampler, TokenLogit};
use rand::RngCore;

/// Scales all logits by dividing by a temperature value.
///
/// Logits are taken relative to the best one first, so the best token keeps
/// a finite logit of 0 for any positive temperature.
///
/// Higher temperatures flatten the distribution (more random), lower
/// temperatures sharpen it towards the arg-max.
pub struct TemperatureSampler {
    temperature: f32,
}

impl TemperatureSampler {
    /// Create a new temperature sampler with the given temperature.
    pub fn new(temperature: f32) -> Self {
        Self { temperature }
    }
}

impl Sampler for TemperatureSampler {
    fn name(&self) -> &str {
        "temperature"
    }

    fn apply(&self, logits: &mut Vec<TokenLogit>, _rng: &mut dyn RngCore) {
        let max_logit = logits
            .iter()
            .map(|t| t.logit)
            .fold(f32::NEG_INFINITY, f32::max);
        if !max_logit.is_finite() {
            return;
        }

        // Shift by the maximum before scaling so the best token stays at 0
        // however small the temperature; the distribution is unchanged.
        for token in logits.iter_mut() {
            token.logit = (token.logit - max_logit) / self.temperature;
        }
    }
}
