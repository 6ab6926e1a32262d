use dr_tensor::DType;
use thiserror::Error;

/// Ways a scoring model can break its output contract.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractViolation {
    #[error("expected log-probabilities of shape {expected:?}, got {got:?}")]
    Shape { expected: Vec<usize>, got: Vec<usize> },
    #[error("expected f32 log-probabilities, got {0}")]
    DType(DType),
    #[error("row {row}, token {token}: log-probability {value} is not allowed")]
    NotFinite { row: usize, token: usize, value: f32 },
    #[error("row {row} is not a normalized distribution (log-sum-exp {log_mass})")]
    Unnormalized { row: usize, log_mass: f32 },
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("scoring contract violation: {0}")]
    ScoringContractViolation(ContractViolation),
    #[error("model error: {0}")]
    Model(#[from] dr_model::ModelError),
    #[error("tensor error: {0}")]
    Tensor(#[from] dr_tensor::TensorError),
    #[error("{0}")]
    Other(String),
}

impl From<ContractViolation> for DecodeError {
    fn from(violation: ContractViolation) -> Self {
        DecodeError::ScoringContractViolation(violation)
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;
