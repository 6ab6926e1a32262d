use crate::sampler::{Sampler, TokenLogit};
use rand::RngCore;

/// Nucleus sampling: keeps the smallest set of tokens whose cumulative
/// probability exceeds the threshold `p`.
pub struct TopPSampler {
    p: f32,
}

impl TopPSampler {
    /// Create a new top-p (nucleus) sampler with the given probability threshold.
    pub fn new(p: f32) -> Self {
        Self { p }
    }
}

impl Sampler for TopPSampler {
    fn name(&self) -> &str {
        "top_p"
    }

    fn apply(&self, logits: &mut Vec<TokenLogit>, _rng: &mut dyn RngCore) {
        if logits.is_empty() {
            return;
        }

        // Sort descending by logit value.
        logits.sort_by(|a, b| b.logit.partial_cmp(&a.logit).unwrap_or(std::cmp::Ordering::Equal));

        // Compute softmax probabilities.
        let max_logit = logits[0].logit;
        let exps: Vec<f32> = logits.iter().map(|t| (t.logit - max_logit).exp()).collect();
        let sum: f32 = exps.iter().sum();

        // Keep tokens until cumulative probability reaches p; at least one survives.
        let mut cumulative = 0.0f32;
        let mut cutoff = logits.len();
        for (i, e) in exps.iter().enumerate() {
            cumulative += e / sum;
            if cumulative >= self.p {
                cutoff = i + 1;
                break;
            }
        }

        logits.truncate(cutoff.max(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn logits(probs: &[f32]) -> Vec<TokenLogit> {
        probs
            .iter()
            .enumerate()
            .map(|(i, &p)| TokenLogit { token_id: i as u32, logit: p.ln() })
            .collect()
    }

    #[test]
    fn test_keeps_nucleus() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut l = logits(&[0.1, 0.6, 0.3]);
        TopPSampler::new(0.8).apply(&mut l, &mut rng);
        let ids: Vec<u32> = l.iter().map(|t| t.token_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_always_keeps_one() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut l = logits(&[0.9, 0.1]);
        TopPSampler::new(0.01).apply(&mut l, &mut rng);
        assert_eq!(l.len(), 1);
        assert_eq!(l[0].token_id, 0);
    }

    #[test]
    fn test_full_mass_keeps_support() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut l = logits(&[0.5, 0.5, 0.0]);
        TopPSampler::new(1.0).apply(&mut l, &mut rng);
        let ids: Vec<u32> = l.iter().map(|t| t.token_id).collect();
        assert_eq!(&ids[..2], &[0, 1]);
    }
}
