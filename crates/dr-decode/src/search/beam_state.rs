use std::cmp::Ordering;
use std::ops::Range;

use dr_model::SpecialTokens;
use dr_tensor::Tensor;

use crate::assemble::FinalSequence;
use crate::error::Result;

use super::is_terminated;

/// One way to extend a beam: keep `parent` (a position within its example's
/// beam) and append `token`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    /// Cumulative log-probability after appending `token`.
    pub score: f32,
    pub parent: usize,
    /// Log-probability of `token` alone (0 for a carried finished hypothesis).
    pub step_log_prob: f32,
    pub token: u32,
    /// True if `parent` had already finished and is carried unchanged.
    pub carried: bool,
}

impl Candidate {
    /// Best first: higher score, then lower parent, then lower token.
    ///
    /// Within one parent the step log-probability is compared before the
    /// token, so that two extensions whose sums round to the same f32 still
    /// rank like their step log-probabilities do.
    pub fn rank(a: &Candidate, b: &Candidate) -> Ordering {
        b.score
            .total_cmp(&a.score)
            .then(a.parent.cmp(&b.parent))
            .then(b.step_log_prob.total_cmp(&a.step_log_prob))
            .then(a.token.cmp(&b.token))
    }
}

/// Keep the `n` best candidates, sorted best first.
pub(crate) fn keep_best(candidates: &mut Vec<Candidate>, n: usize) {
    if n == 0 {
        candidates.clear();
        return;
    }
    if candidates.len() > n {
        candidates.select_nth_unstable_by(n - 1, Candidate::rank);
        candidates.truncate(n);
    }
    candidates.sort_by(Candidate::rank);
}

/// Scores produced by one model call, aligned with `BeamState::expanding_rows`.
pub(crate) struct Expansion<'a> {
    /// State rows that were scored, in call order.
    pub rows: &'a [usize],
    /// `[rows.len(), n_vocab]` next-token log-probabilities.
    pub log_probs: &'a [f32],
    /// `log_probs` with each row's cumulative score added.
    pub totals: &'a [f32],
    pub n_vocab: usize,
}

/// Pruning parameters for one step.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pruning {
    pub beam_width: usize,
    pub branching_factor: Option<usize>,
}

/// Every hypothesis of every example, one row each.
///
/// Example `e` owns the contiguous rows `beams[e]`, sorted best first. The
/// state is never edited in place: `advance` builds the next one.
#[derive(Debug, Clone)]
pub(crate) struct BeamState {
    /// `U32 [rows, prefix_len + steps]`.
    tokens: Tensor,
    scores: Vec<f32>,
    finished: Vec<bool>,
    generated: Vec<usize>,
    beams: Vec<Range<usize>>,
    frozen: Vec<bool>,
}

impl BeamState {
    /// One hypothesis per example holding its prefix. An example whose prefix
    /// already ends with the end marker starts frozen.
    pub fn initial(prefixes: &Tensor, special: &SpecialTokens) -> Result<BeamState> {
        let batch = prefixes.rows()?;
        let finished = (0..batch)
            .map(|r| Ok(is_terminated(prefixes.row_u32(r)?, special)))
            .collect::<Result<Vec<bool>>>()?;
        Ok(BeamState {
            tokens: prefixes.clone(),
            scores: vec![0.0; batch],
            frozen: finished.clone(),
            finished,
            generated: vec![0; batch],
            beams: (0..batch).map(|r| r..r + 1).collect(),
        })
    }

    pub fn tokens(&self) -> &Tensor {
        &self.tokens
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    pub fn all_frozen(&self) -> bool {
        self.frozen.iter().all(|&f| f)
    }

    pub fn frozen_count(&self) -> usize {
        self.frozen.iter().filter(|&&f| f).count()
    }

    /// Unfinished rows of unfrozen examples, paired with their example index.
    pub fn expanding_rows(&self) -> (Vec<usize>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut origins = Vec::new();
        for (e, range) in self.beams.iter().enumerate() {
            if self.frozen[e] {
                continue;
            }
            for r in range.clone().filter(|&r| !self.finished[r]) {
                rows.push(r);
                origins.push(e);
            }
        }
        (rows, origins)
    }

    /// Expand, prune and re-index every unfrozen beam.
    ///
    /// Candidates of one example come from all of its hypotheses at once, so
    /// a strong parent can fill several slots while a weak one disappears.
    /// Finished hypotheses compete with their unchanged score and get the
    /// padding index appended; frozen examples are carried as they are.
    pub fn advance(
        &self,
        expansion: &Expansion<'_>,
        pruning: Pruning,
        special: &SpecialTokens,
    ) -> Result<BeamState> {
        let n_vocab = expansion.n_vocab;
        let mut position = vec![usize::MAX; self.scores.len()];
        for (i, &r) in expansion.rows.iter().enumerate() {
            position[r] = i;
        }

        let mut parents = Vec::with_capacity(self.scores.len());
        let mut column = Vec::with_capacity(self.scores.len());
        let mut scores = Vec::with_capacity(self.scores.len());
        let mut finished = Vec::with_capacity(self.scores.len());
        let mut generated = Vec::with_capacity(self.scores.len());
        let mut beams = Vec::with_capacity(self.beams.len());
        let mut frozen = Vec::with_capacity(self.beams.len());

        for (e, range) in self.beams.iter().enumerate() {
            let start = parents.len();

            if self.frozen[e] {
                for r in range.clone() {
                    parents.push(r);
                    column.push(special.pad);
                    scores.push(self.scores[r]);
                    finished.push(self.finished[r]);
                    generated.push(self.generated[r]);
                }
                beams.push(start..parents.len());
                frozen.push(true);
                continue;
            }

            let mut candidates = Vec::new();
            for (j, r) in range.clone().enumerate() {
                if self.finished[r] {
                    candidates.push(Candidate {
                        score: self.scores[r],
                        parent: j,
                        step_log_prob: 0.0,
                        token: special.pad,
                        carried: true,
                    });
                    continue;
                }
                let i = position[r];
                let offset = i * n_vocab;
                let mut children: Vec<Candidate> = (0..n_vocab)
                    .filter(|&v| expansion.totals[offset + v] != f32::NEG_INFINITY)
                    .map(|v| Candidate {
                        score: expansion.totals[offset + v],
                        parent: j,
                        step_log_prob: expansion.log_probs[offset + v],
                        token: v as u32,
                        carried: false,
                    })
                    .collect();
                if let Some(b) = pruning.branching_factor {
                    keep_best(&mut children, b);
                }
                candidates.append(&mut children);
            }

            keep_best(&mut candidates, pruning.beam_width);

            for c in &candidates {
                let parent = range.start + c.parent;
                parents.push(parent);
                column.push(c.token);
                scores.push(c.score);
                finished.push(c.carried || c.token == special.end);
                generated.push(self.generated[parent] + usize::from(!c.carried));
            }
            let end = parents.len();
            frozen.push(finished[start..end].iter().all(|&f| f));
            beams.push(start..end);
        }

        Ok(BeamState {
            tokens: self.tokens.select_rows(&parents)?.append_column(&column)?,
            scores,
            finished,
            generated,
            beams,
            frozen,
        })
    }

    /// Hand every beam to the assembler, trimmed to prefix plus generated tokens.
    pub fn into_sequences(self, prefix_len: usize) -> Result<Vec<Vec<FinalSequence>>> {
        self.beams
            .iter()
            .map(|range| {
                range
                    .clone()
                    .map(|r| {
                        let row = self.tokens.row_u32(r)?;
                        Ok(FinalSequence {
                            tokens: row[..prefix_len + self.generated[r]].to_vec(),
                            log_prob: self.scores[r],
                            generated: self.generated[r],
                            finished: self.finished[r],
                        })
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEG: f32 = f32::NEG_INFINITY;

    fn cand(score: f32, parent: usize, token: u32) -> Candidate {
        Candidate {
            score,
            parent,
            step_log_prob: score,
            token,
            carried: false,
        }
    }

    #[test]
    fn test_rank_breaks_ties_by_parent_then_token() {
        let mut c = vec![cand(-1.0, 1, 0), cand(-1.0, 0, 4), cand(-1.0, 0, 3), cand(-0.5, 2, 9)];
        keep_best(&mut c, 3);
        let order: Vec<(usize, u32)> = c.iter().map(|c| (c.parent, c.token)).collect();
        assert_eq!(order, vec![(2, 9), (0, 3), (0, 4)]);
    }

    #[test]
    fn test_rank_prefers_larger_step_when_sums_collapse() {
        // Equal sums from one parent: the larger step log-probability wins
        // even with the higher token index, as greedy search would pick.
        let low = Candidate {
            score: -30.0,
            parent: 0,
            step_log_prob: -1.0e-6,
            token: 4,
            carried: false,
        };
        let high = Candidate {
            step_log_prob: -0.5e-6,
            token: 5,
            ..low
        };
        let mut c = vec![low, high];
        keep_best(&mut c, 1);
        assert_eq!(c[0].token, 5);
    }

    #[test]
    fn test_keep_best_with_fewer_candidates() {
        let mut c = vec![cand(-2.0, 0, 1), cand(-1.0, 0, 2)];
        keep_best(&mut c, 5);
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].token, 2);
    }

    fn special() -> SpecialTokens {
        SpecialTokens::default()
    }

    #[test]
    fn test_initial_freezes_terminated_prefixes() {
        let prefixes = Tensor::from_token_rows(&[vec![1, 2], vec![1, 4]]).unwrap();
        let state = BeamState::initial(&prefixes, &special()).unwrap();
        assert!(!state.all_frozen());
        assert_eq!(state.frozen_count(), 1);
        let (rows, origins) = state.expanding_rows();
        assert_eq!(rows, vec![1]);
        assert_eq!(origins, vec![1]);
    }

    #[test]
    fn test_advance_branches_and_carries() {
        // Vocabulary: 0 pad, 1 start, 2 end, 3 unk, 4, 5.
        let prefixes = Tensor::from_token_rows(&[vec![1], vec![2]]).unwrap();
        let state = BeamState::initial(&prefixes, &special()).unwrap();
        let (rows, _) = state.expanding_rows();
        assert_eq!(rows, vec![0]);

        let ln = |p: f32| p.ln();
        let log_probs = vec![NEG, NEG, ln(0.1), NEG, ln(0.6), ln(0.3)];
        let step = state
            .advance(
                &Expansion {
                    rows: &rows,
                    log_probs: &log_probs,
                    totals: &log_probs,
                    n_vocab: 6,
                },
                Pruning {
                    beam_width: 2,
                    branching_factor: None,
                },
                &special(),
            )
            .unwrap();

        assert_eq!(step.tokens().shape().dims(), &[3, 2]);
        assert_eq!(step.tokens().data_u32().unwrap(), &[1, 4, 1, 5, 2, 0]);
        assert_eq!(step.scores()[..2], [ln(0.6), ln(0.3)]);
        assert_eq!(step.scores()[2], 0.0);
        assert_eq!(step.frozen_count(), 1);

        let sequences = step.into_sequences(1).unwrap();
        assert_eq!(sequences[0].len(), 2);
        assert_eq!(sequences[0][1].tokens, vec![1, 5]);
        // The frozen example keeps its prefix and gains nothing.
        assert_eq!(sequences[1][0].tokens, vec![2]);
        assert_eq!(sequences[1][0].generated, 0);
    }

    #[test]
    fn test_branching_factor_limits_children() {
        let prefixes = Tensor::from_token_rows(&[vec![1]]).unwrap();
        let state = BeamState::initial(&prefixes, &special()).unwrap();
        let ln = |p: f32| p.ln();
        let log_probs = vec![NEG, NEG, ln(0.1), NEG, ln(0.6), ln(0.3)];
        let step = state
            .advance(
                &Expansion {
                    rows: &[0],
                    log_probs: &log_probs,
                    totals: &log_probs,
                    n_vocab: 6,
                },
                Pruning {
                    beam_width: 3,
                    branching_factor: Some(1),
                },
                &special(),
            )
            .unwrap();
        assert_eq!(step.tokens().data_u32().unwrap(), &[1, 4]);
    }
}
