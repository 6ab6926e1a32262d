use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid special tokens: {0}")]
    InvalidSpecialTokens(String),
    #[error("duplicate token in vocabulary: {0:?}")]
    DuplicateToken(String),
    #[error("token index {index} out of range for vocabulary of size {vocab_size}")]
    UnknownIndex { index: u32, vocab_size: usize },
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("tensor error: {0}")]
    TensorError(#[from] dr_tensor::TensorError),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
