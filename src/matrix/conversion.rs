//! Conversion functions between sparse contact matrices and dense arrays

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::matrix::SparseContactMatrix;

impl SparseContactMatrix {
    /// Densifies this matrix
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros(self.shape());
        for (i, j, v) in self.iter() {
            dense[[i, j]] = v;
        }
        dense
    }

    /// Builds a contact matrix from the non-zero entries of a dense array
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] if the array is not square, plus any error
    /// of [`SparseContactMatrix::new`].
    pub fn from_dense(dense: &Array2<f64>) -> Result<Self> {
        let (n_rows, n_cols) = dense.dim();
        if n_rows != n_cols {
            return Err(Error::ShapeMismatch {
                expected: (n_rows, n_rows),
                got: (n_rows, n_cols),
            });
        }

        let mut row = Vec::new();
        let mut col = Vec::new();
        let mut data = Vec::new();

        for ((i, j), &v) in dense.indexed_iter() {
            if v != 0.0 {
                row.push(i);
                col.push(j);
                data.push(v);
            }
        }

        SparseContactMatrix::new(n_rows, row, col, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_dense_roundtrip() {
        //    [1 2 0]
        //    [2 0 5]
        //    [0 5 3]
        let dense = array![[1.0, 2.0, 0.0], [2.0, 0.0, 5.0], [0.0, 5.0, 3.0]];

        let sparse = SparseContactMatrix::from_dense(&dense).unwrap();
        assert_eq!(sparse.nnz(), 6);
        assert_eq!(sparse.to_dense(), dense);
    }

    #[test]
    fn test_from_dense_rejects_rectangular() {
        let dense = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            SparseContactMatrix::from_dense(&dense),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
