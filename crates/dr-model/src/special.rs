use crate::error::{ModelError, Result};

/// Reserved token indices shared by a vocabulary and the models scoring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpecialTokens {
    /// Filler appended to sequences that have already finished.
    pub pad: u32,
    /// Start-of-sequence marker.
    pub start: u32,
    /// End-of-sequence marker; emitting it finishes a sequence.
    pub end: u32,
    /// Stand-in for tokens missing from the vocabulary.
    pub unknown: u32,
}

impl Default for SpecialTokens {
    /// Padding at 0, start at 1, end at 2, unknown at 3.
    fn default() -> Self {
        Self {
            pad: 0,
            start: 1,
            end: 2,
            unknown: 3,
        }
    }
}

impl SpecialTokens {
    /// All reserved indices, in `[pad, start, end, unknown]` order.
    pub fn all(&self) -> [u32; 4] {
        [self.pad, self.start, self.end, self.unknown]
    }

    /// Returns true if `index` is one of the reserved indices.
    pub fn is_special(&self, index: u32) -> bool {
        self.all().contains(&index)
    }

    /// Check that every reserved index is distinct and inside `[0, vocab_size)`.
    pub fn validate(&self, vocab_size: usize) -> Result<()> {
        let all = self.all();
        for (i, &index) in all.iter().enumerate() {
            if index as usize >= vocab_size {
                return Err(ModelError::InvalidSpecialTokens(format!(
                    "index {} outside vocabulary of size {}",
                    index, vocab_size
                )));
            }
            if all[..i].contains(&index) {
                return Err(ModelError::InvalidSpecialTokens(format!(
                    "index {} reserved twice",
                    index
                )));
            }
        }
        Ok(())
    }
}

/// The last non-padding token of a sequence, if any.
pub fn last_token(sequence: &[u32], pad: u32) -> Option<u32> {
    sequence.iter().rev().copied().find(|&t| t != pad)
}
