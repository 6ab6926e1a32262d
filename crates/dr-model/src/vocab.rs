use std::collections::HashMap;

use crate::error::{ModelError, Result};
use crate::special::SpecialTokens;

/// Bijective mapping between token strings and indices.
///
/// Every index in `[0, len())` maps to exactly one token string, reserved
/// markers included, and every token string maps back to exactly one index.
pub struct Vocabulary {
    /// Token strings, indexed by token ID.
    tokens: Vec<String>,
    /// Reverse mapping from token string to token ID.
    token_to_id: HashMap<String, u32>,
    /// Reserved marker indices.
    special: SpecialTokens,
}

impl Vocabulary {
    /// Marker strings used by `with_reserved`, in `SpecialTokens::default()` order.
    pub const RESERVED: [&'static str; 4] = ["<PAD>", "<START>", "<END>", "<UNK>"];

    /// Build a vocabulary from the full token list (reserved markers included).
    ///
    /// Fails if a token appears twice or a special index falls outside the list.
    pub fn new(tokens: Vec<String>, special: SpecialTokens) -> Result<Vocabulary> {
        special.validate(tokens.len())?;

        let mut token_to_id = HashMap::with_capacity(tokens.len());
        for (id, tok) in tokens.iter().enumerate() {
            if token_to_id.insert(tok.clone(), id as u32).is_some() {
                return Err(ModelError::DuplicateToken(tok.clone()));
            }
        }

        Ok(Vocabulary {
            tokens,
            token_to_id,
            special,
        })
    }

    /// Build a vocabulary with the default reserved layout followed by `symbols`.
    pub fn with_reserved<I, S>(symbols: I) -> Result<Vocabulary>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens = Self::RESERVED
            .iter()
            .map(|s| s.to_string())
            .chain(symbols.into_iter().map(Into::into))
            .collect();
        Self::new(tokens, SpecialTokens::default())
    }

    /// Number of tokens in the vocabulary.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn special_tokens(&self) -> SpecialTokens {
        self.special
    }

    /// The token string at `index`.
    pub fn token(&self, index: u32) -> Option<&str> {
        self.tokens.get(index as usize).map(String::as_str)
    }

    /// The index of `token`.
    pub fn index(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    /// Map tokens to indices; tokens missing from the vocabulary map to the
    /// unknown index.
    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<u32> {
        tokens
            .iter()
            .map(|t| self.index(t.as_ref()).unwrap_or(self.special.unknown))
            .collect()
    }

    /// Map indices back to token strings.
    ///
    /// Output stops at the first end marker (kept), so trailing padding after
    /// a finished sequence is never rendered.
    pub fn decode(&self, indices: &[u32]) -> Result<Vec<&str>> {
        let mut out = Vec::with_capacity(indices.len());
        for &index in indices {
            let tok = self.token(index).ok_or(ModelError::UnknownIndex {
                index,
                vocab_size: self.len(),
            })?;
            out.push(tok);
            if index == self.special.end {
                break;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        Vocabulary::with_reserved(["a", "b", "c"]).unwrap()
    }

    #[test]
    fn test_reserved_layout() {
        let v = vocab();
        assert_eq!(v.len(), 7);
        assert_eq!(v.token(0), Some("<PAD>"));
        assert_eq!(v.token(2), Some("<END>"));
        assert_eq!(v.index("a"), Some(4));
        assert_eq!(v.token(7), None);
    }

    #[test]
    fn test_bijection() {
        let v = vocab();
        for id in 0..v.len() as u32 {
            let tok = v.token(id).unwrap();
            assert_eq!(v.index(tok), Some(id));
        }
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = Vocabulary::with_reserved(["a", "a"]).err().unwrap();
        assert!(matches!(err, ModelError::DuplicateToken(t) if t == "a"));
        assert!(Vocabulary::with_reserved(["<END>"]).is_err());
    }

    #[test]
    fn test_encode_unknown_fallback() {
        let v = vocab();
        assert_eq!(v.encode(&["a", "z", "c"]), vec![4, 3, 6]);
    }

    #[test]
    fn test_decode_stops_after_end() {
        let v = vocab();
        assert_eq!(
            v.decode(&[1, 4, 5, 2, 0, 0]).unwrap(),
            vec!["<START>", "a", "b", "<END>"]
        );
        assert!(matches!(
            v.decode(&[9]),
            Err(ModelError::UnknownIndex { index: 9, .. })
        ));
    }

    #[test]
    fn test_special_outside_vocab_rejected() {
        let tokens = vec!["x".to_string(), "y".to_string()];
        assert!(Vocabulary::new(tokens, SpecialTokens::default()).is_err());
    }
}
