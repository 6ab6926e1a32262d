use crate::sampler::{Sampler, TokenLogit};
use rand::distributions::{Distribution, WeightedIndex};
use rand::RngCore;

/// Greedy sampler: selects the single token with the highest logit.
///
/// The sort is stable, so among equal logits the lowest token index wins.
pub struct GreedySampler;

impl GreedySampler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GreedySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for GreedySampler {
    fn name(&self) -> &str {
        "greedy"
    }

    fn apply(&self, logits: &mut Vec<TokenLogit>, _rng: &mut dyn RngCore) {
        if logits.is_empty() {
            return;
        }

        // Sort descending by logit value.
        logits.sort_by(|a, b| b.logit.partial_cmp(&a.logit).unwrap_or(std::cmp::Ordering::Equal));

        // Keep only the top 1.
        logits.truncate(1);
    }
}

/// Distribution-based sampler: converts logits to probabilities via softmax,
/// then draws one token from the resulting categorical distribution using the
/// decoder's random source.
pub struct DistSampler;

impl DistSampler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DistSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for DistSampler {
    fn name(&self) -> &str {
        "dist"
    }

    fn apply(&self, logits: &mut Vec<TokenLogit>, rng: &mut dyn RngCore) {
        if logits.is_empty() {
            return;
        }

        // Compute softmax probabilities. Impossible tokens (-inf) get weight 0.
        let max_logit = logits
            .iter()
            .map(|t| t.logit)
            .fold(f32::NEG_INFINITY, f32::max);

        let exps: Vec<f32> = logits.iter().map(|t| (t.logit - max_logit).exp()).collect();
        let sum: f32 = exps.iter().sum();
        let probs: Vec<f32> = exps.iter().map(|e| e / sum).collect();

        // No valid weights (every logit -inf or NaN): select nothing and let
        // the chain report it.
        let Ok(dist) = WeightedIndex::new(&probs) else {
            logits.clear();
            return;
        };

        let selected_index = dist.sample(rng);
        let selected = logits[selected_index].clone();

        logits.clear();
        logits.push(selected);
    }
}
