use crate::dtype::DType;
use crate::error::{Result, TensorError};

/// CPU-side tensor storage.
///
/// Token batches live in `U32` storage, distributions and scores in `F32`.
#[derive(Debug, Clone, PartialEq)]
pub enum CpuStorage {
    /// 32-bit floating point storage.
    F32(Vec<f32>),
    /// Token index storage.
    U32(Vec<u32>),
}

impl CpuStorage {
    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        match self {
            CpuStorage::F32(v) => v.len(),
            CpuStorage::U32(v) => v.len(),
        }
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the data as an f32 slice.
    ///
    /// # Errors
    /// Returns `DTypeMismatch` if the storage holds token indices.
    pub fn as_f32_slice(&self) -> Result<&[f32]> {
        match self {
            CpuStorage::F32(v) => Ok(v.as_slice()),
            other => Err(mismatch(DType::F32, other.dtype())),
        }
    }

    /// Returns the data as a u32 slice.
    ///
    /// # Errors
    /// Returns `DTypeMismatch` if the storage holds floats.
    pub fn as_u32_slice(&self) -> Result<&[u32]> {
        match self {
            CpuStorage::U32(v) => Ok(v.as_slice()),
            other => Err(mismatch(DType::U32, other.dtype())),
        }
    }

    /// Create empty storage with the dtype of `self` and room for `capacity` elements.
    pub(crate) fn empty_like(&self, capacity: usize) -> Self {
        match self {
            CpuStorage::F32(_) => CpuStorage::F32(Vec::with_capacity(capacity)),
            CpuStorage::U32(_) => CpuStorage::U32(Vec::with_capacity(capacity)),
        }
    }

    /// Create storage from an f32 vector.
    pub fn from_f32_vec(data: Vec<f32>) -> Self {
        CpuStorage::F32(data)
    }

    /// Create storage from a vector of token indices.
    pub fn from_u32_vec(data: Vec<u32>) -> Self {
        CpuStorage::U32(data)
    }

    /// Returns the dtype of this storage.
    pub fn dtype(&self) -> DType {
        match self {
            CpuStorage::F32(_) => DType::F32,
            CpuStorage::U32(_) => DType::U32,
        }
    }

    /// Copy `len` elements starting at `offset` onto the end of `out`.
    ///
    /// Both storages must share a dtype; callers guarantee this by creating
    /// `out` with `empty_like` or from the same source.
    pub(crate) fn extend_from(&self, out: &mut CpuStorage, offset: usize, len: usize) {
        match (self, out) {
            (CpuStorage::F32(src), CpuStorage::F32(dst)) => {
                dst.extend_from_slice(&src[offset..offset + len])
            }
            (CpuStorage::U32(src), CpuStorage::U32(dst)) => {
                dst.extend_from_slice(&src[offset..offset + len])
            }
            _ => unreachable!("storage dtypes diverged"),
        }
    }
}

fn mismatch(expected: DType, got: DType) -> TensorError {
    TensorError::DTypeMismatch {
        expected: expected.to_string(),
        got: got.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f32_vec() {
        let s = CpuStorage::from_f32_vec(vec![1.0, 2.0, 3.0]);
        assert_eq!(s.len(), 3);
        assert!(!s.is_empty());
        assert_eq!(s.as_f32_slice().unwrap(), &[1.0, 2.0, 3.0]);
        assert!(s.as_u32_slice().is_err());
    }

    #[test]
    fn test_from_u32_vec() {
        let s = CpuStorage::from_u32_vec(vec![1, 3, 2]);
        assert_eq!(s.dtype(), DType::U32);
        assert_eq!(s.as_u32_slice().unwrap(), &[1, 3, 2]);
        assert!(matches!(
            s.as_f32_slice(),
            Err(TensorError::DTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_extend_from() {
        let src = CpuStorage::from_u32_vec(vec![1, 2, 3, 4]);
        let mut dst = src.empty_like(2);
        src.extend_from(&mut dst, 1, 2);
        assert_eq!(dst.as_u32_slice().unwrap(), &[2, 3]);
    }
}
