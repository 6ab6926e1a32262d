//! `dr-decode` - Sequence decoders over a `ScoringModel`.
//!
//! - `greedy_search`: arg-max token per step
//! - `sample`: draws from the temperature-scaled distribution, with optional
//!   top-k and top-p filters
//! - `beam_search`: keeps the `k` best hypotheses per example
//!
//! `Decoder` bundles a model with a compute backend and an optional
//! cancellation flag and exposes every method, including `generate`.

mod assemble;
pub mod cancel;
pub mod config;
pub mod contract;
pub mod decoder;
pub mod error;
pub mod output;
pub mod sampler;
mod search;
pub mod select;
pub mod temperature;
pub mod top_k;
pub mod top_p;

pub use cancel::{CancelAfter, Cancellation};
pub use config::{
    BeamConfig, DecodingMethod, GreedyConfig, LengthNormalization, SampleConfig, DEFAULT_BEAM_WIDTH,
    DEFAULT_MAX_LENGTH,
};
pub use contract::{score_checked, validate_log_probs, NORMALIZATION_TOLERANCE};
pub use decoder::{beam_search, greedy_search, sample, Decoder};
pub use error::{ContractViolation, DecodeError, Result};
pub use output::{BeamDecoded, Completion, Decoded, Hypothesis};
pub use sampler::{Sampler, SamplerChain, TokenLogit};
pub use select::{DistSampler, GreedySampler};
pub use temperature::TemperatureSampler;
pub use top_k::TopKSampler;
pub use top_p::TopPSampler;
