use thiserror::Error;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: String, got: String },
    #[error("expected a tensor with {expected} dimensions, got {got}")]
    RankMismatch { expected: usize, got: usize },
    #[error("row {row} out of bounds for tensor with {rows} rows")]
    RowOutOfBounds { row: usize, rows: usize },
    #[error("ragged rows: row {row} has length {got}, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;
