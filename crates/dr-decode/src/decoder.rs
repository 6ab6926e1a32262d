use std::sync::Arc;

use dr_model::ScoringModel;
use dr_tensor::{ComputeBackend, CpuBackend, Tensor};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::cancel::Cancellation;
use crate::config::{BeamConfig, DecodingMethod, GreedyConfig, LengthNormalization, SampleConfig};
use crate::error::Result;
use crate::output::{BeamDecoded, Decoded};
use crate::sampler::SamplerChain;
use crate::search::single::SingleSearch;
use crate::search::{beam, single};
use crate::select::{DistSampler, GreedySampler};
use crate::temperature::TemperatureSampler;
use crate::top_k::TopKSampler;
use crate::top_p::TopPSampler;

/// Runs the decoders against one model.
///
/// Holds the compute backend used for candidate scoring and the contract
/// check, and an optional cancellation flag polled before every step.
pub struct Decoder<'m, M: ScoringModel + ?Sized> {
    model: &'m M,
    backend: Arc<dyn ComputeBackend>,
    cancellation: Option<Arc<dyn Cancellation>>,
}

impl<'m, M: ScoringModel + ?Sized> Decoder<'m, M> {
    /// Decoder on the CPU backend, without cancellation.
    pub fn new(model: &'m M) -> Self {
        Self {
            model,
            backend: Arc::new(CpuBackend::new()),
            cancellation: None,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn ComputeBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Stop between steps once `cancellation` fires; the partial result is
    /// still returned, marked `Completion::Cancelled`.
    pub fn with_cancellation(mut self, cancellation: Arc<dyn Cancellation>) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    pub fn model(&self) -> &M {
        self.model
    }

    pub fn backend(&self) -> &dyn ComputeBackend {
        self.backend.as_ref()
    }

    /// Append the most likely token to every prefix until it emits the end
    /// marker or `max_length` tokens were added.
    pub fn greedy_search(&self, initial: &Tensor, config: &GreedyConfig) -> Result<Decoded> {
        config.validate()?;
        let chain = SamplerChain::new().with(Box::new(GreedySampler::new()));
        // The greedy chain never draws; any source will do.
        let mut rng = StdRng::seed_from_u64(0);
        single::run(self.model, initial, &self.single(config.max_length, &chain), &mut rng)
    }

    /// Draw each next token from the model's distribution, reshaped by the
    /// configured temperature and filters, using the caller's random source.
    ///
    /// Reported log-probabilities are those of the unmodified model output.
    pub fn sample(
        &self,
        initial: &Tensor,
        config: &SampleConfig,
        rng: &mut dyn RngCore,
    ) -> Result<Decoded> {
        config.validate()?;
        let chain = sampling_chain(config);
        single::run(self.model, initial, &self.single(config.max_length, &chain), rng)
    }

    /// Like `sample`, with a random source seeded from `config.seed`, or from
    /// the operating system when no seed is set.
    pub fn sample_seeded(&self, initial: &Tensor, config: &SampleConfig) -> Result<Decoded> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.sample(initial, config, &mut rng)
    }

    pub fn beam_search(&self, initial: &Tensor, config: &BeamConfig) -> Result<BeamDecoded> {
        beam::run(
            self.model,
            initial,
            config,
            self.backend.as_ref(),
            self.cancellation.as_deref(),
        )
    }

    /// Decode with the selected method. Beam search keeps only its best
    /// hypothesis per example.
    pub fn generate(&self, initial: &Tensor, method: &DecodingMethod) -> Result<Decoded> {
        match method {
            DecodingMethod::Greedy(config) => self.greedy_search(initial, config),
            DecodingMethod::Sample(config) => self.sample_seeded(initial, config),
            DecodingMethod::Beam(config) => self.beam_search(initial, config)?.best(),
        }
    }

    fn single<'a>(&'a self, max_length: usize, chain: &'a SamplerChain) -> SingleSearch<'a> {
        SingleSearch {
            backend: self.backend.as_ref(),
            cancellation: self.cancellation.as_deref(),
            max_length,
            chain,
        }
    }
}

/// Temperature, then the optional top-k and top-p filters, then a draw.
fn sampling_chain(config: &SampleConfig) -> SamplerChain {
    let mut chain = SamplerChain::new().with(Box::new(TemperatureSampler::new(config.temperature)));
    if let Some(k) = config.top_k {
        chain = chain.with(Box::new(TopKSampler::new(k)));
    }
    if let Some(p) = config.top_p {
        chain = chain.with(Box::new(TopPSampler::new(p)));
    }
    chain.with(Box::new(DistSampler::new()))
}

/// Greedy search on the CPU backend.
pub fn greedy_search<M: ScoringModel + ?Sized>(
    model: &M,
    initial: &Tensor,
    max_length: usize,
) -> Result<Decoded> {
    Decoder::new(model).greedy_search(initial, &GreedyConfig { max_length })
}

/// Temperature sampling on the CPU backend.
pub fn sample<M: ScoringModel + ?Sized>(
    model: &M,
    initial: &Tensor,
    max_length: usize,
    temperature: f32,
    rng: &mut dyn RngCore,
) -> Result<Decoded> {
    let config = SampleConfig {
        max_length,
        temperature,
        ..SampleConfig::default()
    };
    Decoder::new(model).sample(initial, &config, rng)
}

/// Beam search over the full vocabulary on the CPU backend.
pub fn beam_search<M: ScoringModel + ?Sized>(
    model: &M,
    initial: &Tensor,
    max_length: usize,
    beam_width: usize,
    length_normalization: LengthNormalization,
) -> Result<BeamDecoded> {
    let config = BeamConfig {
        max_length,
        beam_width,
        branching_factor: None,
        length_normalization,
    };
    Decoder::new(model).beam_search(initial, &config)
}
