//! `dr-model` - What decoders consume from a model.
//!
//! - `ScoringModel`: the single capability trait decoders depend on
//! - `SpecialTokens` and `Vocabulary`: reserved indices and the token mapping
//! - `BigramModel` and `FnModel`: reference scorers

pub mod bigram;
pub mod error;
pub mod scorer;
pub mod special;
pub mod vocab;

pub use bigram::BigramModel;
pub use error::{ModelError, Result};
pub use scorer::{FnModel, ScoringModel};
pub use special::{last_token, SpecialTokens};
pub use vocab::Vocabulary;
