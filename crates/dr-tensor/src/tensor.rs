use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::storage::CpuStorage;

/// A dense, row-major tensor backed by CPU storage.
///
/// Token batches are `U32` tensors of shape `[batch, length]` (or
/// `[batch, beam_width, length]` for beam output); next-token distributions
/// and scores are `F32` tensors. Tensors are never mutated in place: every
/// row operation returns a fresh tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    storage: CpuStorage,
    shape: Shape,
}

impl Tensor {
    /// Create a new f32 tensor from data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {:?} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor {
            storage: CpuStorage::from_f32_vec(data),
            shape,
        }
    }

    /// Create a new token tensor from indices and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn from_tokens(data: Vec<u32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "token count {} does not match shape {:?} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor {
            storage: CpuStorage::from_u32_vec(data),
            shape,
        }
    }

    /// Build a `[rows, cols]` token tensor from equal-length rows.
    ///
    /// # Errors
    /// Returns `RaggedRows` if the rows differ in length.
    pub fn from_token_rows(rows: &[Vec<u32>]) -> Result<Tensor> {
        let (data, shape) = flatten_rows(rows)?;
        Ok(Tensor::from_tokens(data, shape))
    }

    /// Build a `[rows, cols]` f32 tensor from equal-length rows.
    ///
    /// # Errors
    /// Returns `RaggedRows` if the rows differ in length.
    pub fn from_f32_rows(rows: &[Vec<f32>]) -> Result<Tensor> {
        let (data, shape) = flatten_rows(rows)?;
        Ok(Tensor::new(data, shape))
    }

    /// Create a zero-filled f32 tensor with the given shape.
    pub fn zeros(shape: Shape) -> Self {
        let n = shape.numel();
        Tensor {
            storage: CpuStorage::from_f32_vec(vec![0.0; n]),
            shape,
        }
    }

    /// Returns a reference to the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Returns the underlying data as an f32 slice.
    pub fn data_f32(&self) -> Result<&[f32]> {
        self.storage.as_f32_slice()
    }

    /// Returns the underlying data as a token slice.
    pub fn data_u32(&self) -> Result<&[u32]> {
        self.storage.as_u32_slice()
    }

    /// Number of rows of a 2D tensor.
    pub fn rows(&self) -> Result<usize> {
        Ok(self.shape.as_matrix()?.0)
    }

    /// Number of columns of a 2D tensor.
    pub fn cols(&self) -> Result<usize> {
        Ok(self.shape.as_matrix()?.1)
    }

    /// Row `i` of a 2D f32 tensor.
    pub fn row_f32(&self, i: usize) -> Result<&[f32]> {
        let (start, end) = self.row_bounds(i)?;
        Ok(&self.data_f32()?[start..end])
    }

    /// Row `i` of a 2D token tensor.
    pub fn row_u32(&self, i: usize) -> Result<&[u32]> {
        let (start, end) = self.row_bounds(i)?;
        Ok(&self.data_u32()?[start..end])
    }

    /// Gather the given rows of a 2D tensor into a new tensor, in order.
    ///
    /// Rows may repeat; this is how surviving beams are re-indexed after
    /// pruning.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Tensor> {
        let (n_rows, cols) = self.shape.as_matrix()?;
        let mut storage = self.storage.empty_like(rows.len() * cols);
        for &row in rows {
            if row >= n_rows {
                return Err(TensorError::RowOutOfBounds { row, rows: n_rows });
            }
            self.storage.extend_from(&mut storage, row * cols, cols);
        }
        Ok(Tensor {
            storage,
            shape: Shape::matrix(rows.len(), cols),
        })
    }

    /// Append one token per row to a 2D token tensor, returning `[rows, cols + 1]`.
    pub fn append_column(&self, column: &[u32]) -> Result<Tensor> {
        let (rows, cols) = self.shape.as_matrix()?;
        if column.len() != rows {
            return Err(TensorError::ShapeMismatch {
                expected: vec![rows],
                got: vec![column.len()],
            });
        }
        let data = self.data_u32()?;
        let mut out = Vec::with_capacity(rows * (cols + 1));
        for (r, &token) in column.iter().enumerate() {
            out.extend_from_slice(&data[r * cols..(r + 1) * cols]);
            out.push(token);
        }
        Ok(Tensor::from_tokens(out, Shape::matrix(rows, cols + 1)))
    }

    fn row_bounds(&self, i: usize) -> Result<(usize, usize)> {
        let (rows, cols) = self.shape.as_matrix()?;
        if i >= rows {
            return Err(TensorError::RowOutOfBounds { row: i, rows });
        }
        Ok((i * cols, (i + 1) * cols))
    }
}

fn flatten_rows<T: Copy>(rows: &[Vec<T>]) -> Result<(Vec<T>, Shape)> {
    let cols = rows.first().map(Vec::len).unwrap_or(0);
    let mut data = Vec::with_capacity(rows.len() * cols);
    for (row, values) in rows.iter().enumerate() {
        if values.len() != cols {
            return Err(TensorError::RaggedRows {
                row,
                expected: cols,
                got: values.len(),
            });
        }
        data.extend_from_slice(values);
    }
    Ok((data, Shape::matrix(rows.len(), cols)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tensor() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        assert_eq!(t.shape().dims(), &[2, 3]);
        assert_eq!(t.dtype(), DType::F32);
        assert_eq!(t.row_f32(1).unwrap(), &[4.0, 5.0, 6.0]);
        assert!(t.data_u32().is_err());
    }

    #[test]
    fn test_token_rows() {
        let t = Tensor::from_token_rows(&[vec![1, 3], vec![1, 4]]).unwrap();
        assert_eq!(t.dtype(), DType::U32);
        assert_eq!(t.rows().unwrap(), 2);
        assert_eq!(t.cols().unwrap(), 2);
        assert_eq!(t.row_u32(1).unwrap(), &[1, 4]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Tensor::from_token_rows(&[vec![1, 3], vec![1]]).unwrap_err();
        assert!(matches!(err, TensorError::RaggedRows { row: 1, .. }));
    }

    #[test]
    fn test_empty_prefixes() {
        let t = Tensor::from_token_rows(&[vec![], vec![]]).unwrap();
        assert_eq!(t.shape().dims(), &[2, 0]);
        assert_eq!(t.row_u32(0).unwrap(), &[] as &[u32]);
        let t = t.append_column(&[5, 6]).unwrap();
        assert_eq!(t.data_u32().unwrap(), &[5, 6]);
    }

    #[test]
    fn test_select_rows_repeats_and_reorders() {
        let t = Tensor::from_token_rows(&[vec![1, 3], vec![1, 4], vec![1, 2]]).unwrap();
        let s = t.select_rows(&[2, 0, 0]).unwrap();
        assert_eq!(s.shape().dims(), &[3, 2]);
        assert_eq!(s.data_u32().unwrap(), &[1, 2, 1, 3, 1, 3]);
        assert!(matches!(
            t.select_rows(&[3]),
            Err(TensorError::RowOutOfBounds { row: 3, rows: 3 })
        ));
    }

    #[test]
    fn test_append_column() {
        let t = Tensor::from_token_rows(&[vec![1], vec![1]]).unwrap();
        let t2 = t.append_column(&[3, 0]).unwrap();
        assert_eq!(t2.shape().dims(), &[2, 2]);
        assert_eq!(t2.data_u32().unwrap(), &[1, 3, 1, 0]);
        // The source tensor is untouched.
        assert_eq!(t.data_u32().unwrap(), &[1, 1]);
        assert!(t.append_column(&[3]).is_err());
    }

    #[test]
    #[should_panic]
    fn test_new_shape_mismatch_panics() {
        let _t = Tensor::new(vec![1.0, 2.0], Shape::new(vec![3]));
    }
}
