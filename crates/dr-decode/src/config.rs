use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, Result};

/// Generation cap used when a configuration does not set one.
pub const DEFAULT_MAX_LENGTH: usize = 32;

/// Beam width used when a configuration does not set one.
pub const DEFAULT_BEAM_WIDTH: usize = 5;

fn invalid(msg: impl Into<String>) -> DecodeError {
    DecodeError::InvalidConfiguration(msg.into())
}

fn check_max_length(max_length: usize) -> Result<()> {
    if max_length < 1 {
        return Err(invalid("max_length must be at least 1"));
    }
    Ok(())
}

/// Configuration for greedy search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreedyConfig {
    /// Maximum number of tokens appended to each prefix.
    pub max_length: usize,
}

impl Default for GreedyConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

impl GreedyConfig {
    pub fn validate(&self) -> Result<()> {
        check_max_length(self.max_length)
    }
}

/// Configuration for stochastic sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    /// Maximum number of tokens appended to each prefix.
    pub max_length: usize,
    /// Divides the log-probabilities before drawing; must be positive.
    pub temperature: f32,
    /// Restrict each draw to the `k` most likely tokens.
    pub top_k: Option<usize>,
    /// Restrict each draw to the smallest nucleus with at least this mass.
    pub top_p: Option<f32>,
    /// Seed for the random source when the caller does not inject one.
    pub seed: Option<u64>,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            temperature: 1.0,
            top_k: None,
            top_p: None,
            seed: None,
        }
    }
}

impl SampleConfig {
    pub fn validate(&self) -> Result<()> {
        check_max_length(self.max_length)?;
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(invalid(format!(
                "temperature must be a positive number, got {}",
                self.temperature
            )));
        }
        if self.top_k == Some(0) {
            return Err(invalid("top_k must be at least 1"));
        }
        if let Some(p) = self.top_p {
            if !(p > 0.0 && p <= 1.0) {
                return Err(invalid(format!("top_p must be in (0, 1], got {}", p)));
            }
        }
        Ok(())
    }
}

/// How final beam hypotheses are ranked.
///
/// Pruning during the search always uses the raw cumulative log-probability;
/// normalization only reorders the returned hypotheses.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthNormalization {
    /// Rank by cumulative log-probability.
    #[default]
    Off,
    /// Rank by cumulative log-probability divided by the generated length.
    Mean,
    /// Rank by cumulative log-probability divided by `length^alpha`.
    Power(f32),
}

impl LengthNormalization {
    /// Ranking score of a hypothesis with `generated` new tokens.
    pub fn apply(&self, log_prob: f32, generated: usize) -> f32 {
        let length = generated.max(1) as f32;
        match *self {
            LengthNormalization::Off => log_prob,
            LengthNormalization::Mean => log_prob / length,
            LengthNormalization::Power(alpha) => log_prob / length.powf(alpha),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let LengthNormalization::Power(alpha) = *self {
            if !(alpha.is_finite() && alpha >= 0.0) {
                return Err(invalid(format!(
                    "length normalization exponent must be a non-negative number, got {}",
                    alpha
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for beam search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamConfig {
    /// Maximum number of tokens appended to each prefix.
    pub max_length: usize,
    /// Hypotheses kept per example after every pruning step (`k`).
    pub beam_width: usize,
    /// Tokens each hypothesis may contribute before global pruning; `None`
    /// lets every vocabulary entry compete.
    pub branching_factor: Option<usize>,
    pub length_normalization: LengthNormalization,
}

impl Default for BeamConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            beam_width: DEFAULT_BEAM_WIDTH,
            branching_factor: None,
            length_normalization: LengthNormalization::Off,
        }
    }
}

impl BeamConfig {
    pub fn validate(&self) -> Result<()> {
        check_max_length(self.max_length)?;
        if self.beam_width < 1 {
            return Err(invalid("beam_width must be at least 1"));
        }
        if self.branching_factor == Some(0) {
            return Err(invalid("branching_factor must be at least 1"));
        }
        self.length_normalization.validate()
    }
}

/// Decoding method selected by `Decoder::generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DecodingMethod {
    Greedy(GreedyConfig),
    Sample(SampleConfig),
    Beam(BeamConfig),
}

impl Default for DecodingMethod {
    fn default() -> Self {
        DecodingMethod::Greedy(GreedyConfig::default())
    }
}

impl DecodingMethod {
    pub fn validate(&self) -> Result<()> {
        match self {
            DecodingMethod::Greedy(c) => c.validate(),
            DecodingMethod::Sample(c) => c.validate(),
            DecodingMethod::Beam(c) => c.validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_defaults_are_valid() {
        assert!(GreedyConfig::default().validate().is_ok());
        assert!(SampleConfig::default().validate().is_ok());
        assert!(BeamConfig::default().validate().is_ok());
        assert!(DecodingMethod::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_max_length() {
        let c = GreedyConfig { max_length: 0 };
        assert!(matches!(c.validate(), Err(DecodeError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_rejects_bad_temperature() {
        for t in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let c = SampleConfig {
                temperature: t,
                ..SampleConfig::default()
            };
            assert!(c.validate().is_err(), "temperature {} accepted", t);
        }
    }

    #[test]
    fn test_rejects_bad_filters() {
        let c = SampleConfig {
            top_k: Some(0),
            ..SampleConfig::default()
        };
        assert!(c.validate().is_err());
        let c = SampleConfig {
            top_p: Some(1.5),
            ..SampleConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_beam() {
        let c = BeamConfig {
            beam_width: 0,
            ..BeamConfig::default()
        };
        assert!(c.validate().is_err());
        let c = BeamConfig {
            branching_factor: Some(0),
            ..BeamConfig::default()
        };
        assert!(c.validate().is_err());
        let c = BeamConfig {
            length_normalization: LengthNormalization::Power(-1.0),
            ..BeamConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_length_normalization() {
        assert_eq!(LengthNormalization::Off.apply(-6.0, 3), -6.0);
        assert_eq!(LengthNormalization::Mean.apply(-6.0, 3), -2.0);
        assert_eq!(LengthNormalization::Mean.apply(-6.0, 0), -6.0);
        assert_abs_diff_eq!(
            LengthNormalization::Power(0.5).apply(-6.0, 4),
            -3.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_method_from_json() {
        let m: DecodingMethod = serde_json::from_str(
            r#"{"method": "beam", "beam_width": 3, "length_normalization": "mean"}"#,
        )
        .unwrap();
        assert_eq!(
            m,
            DecodingMethod::Beam(BeamConfig {
                beam_width: 3,
                length_normalization: LengthNormalization::Mean,
                ..BeamConfig::default()
            })
        );

        let m: DecodingMethod =
            serde_json::from_str(r#"{"method": "sample", "temperature": 0.7, "seed": 9}"#).unwrap();
        match m {
            DecodingMethod::Sample(c) => {
                assert_eq!(c.seed, Some(9));
                assert_eq!(c.max_length, DEFAULT_MAX_LENGTH);
            }
            other => panic!("unexpected method {:?}", other),
        }
    }

    #[test]
    fn test_power_normalization_from_json() {
        let c: BeamConfig =
            serde_json::from_str(r#"{"length_normalization": {"power": 0.6}}"#).unwrap();
        assert_eq!(c.length_normalization, LengthNormalization::Power(0.6));
    }
}
