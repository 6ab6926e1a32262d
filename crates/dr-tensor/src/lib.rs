//! `dr-tensor` - Token and log-probability tensors for decode-runtime.
//!
//! This crate provides:
//! - A `Tensor` type holding either token indices (`U32`) or scores (`F32`)
//! - Row gather/append operations used to advance hypothesis batches
//! - A `ComputeBackend` trait for the vectorized row operations decoders need
//! - A reference `CpuBackend` implementation

pub mod backend;
pub mod cpu;
pub mod dtype;
pub mod error;
pub mod shape;
pub mod storage;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use backend::ComputeBackend;
pub use cpu::CpuBackend;
pub use dtype::DType;
pub use error::{Result, TensorError};
pub use shape::Shape;
pub use storage::CpuStorage;
pub use tensor::Tensor;
