//! Utilities for converting between contact matrices and sprs

use sprs::CsMat;

use crate::error::{Error, Result};
use crate::matrix::SparseContactMatrix;
use crate::utils::exclusive_scan;

/// Converts a contact matrix to sprs CSR format
///
/// Canonical storage is already row-major and sorted, so only the row
/// pointer has to be built.
pub fn to_sprs_csr(matrix: &SparseContactMatrix) -> CsMat<f64> {
    let n = matrix.n_bins();
    let mut counts = vec![0usize; n];
    for &i in matrix.rows() {
        counts[i] += 1;
    }

    CsMat::new(
        (n, n),
        exclusive_scan(&counts),
        matrix.cols().to_vec(),
        matrix.values().to_vec(),
    )
}

/// Converts a square sprs matrix (CSR or CSC) to a contact matrix
///
/// # Errors
///
/// [`Error::ShapeMismatch`] if the matrix is not square, plus any validation
/// error raised by [`SparseContactMatrix::new`].
pub fn from_sprs(matrix: &CsMat<f64>) -> Result<SparseContactMatrix> {
    let (n_rows, n_cols) = matrix.shape();
    if n_rows != n_cols {
        return Err(Error::ShapeMismatch {
            expected: (n_rows, n_rows),
            got: (n_rows, n_cols),
        });
    }

    let nnz = matrix.nnz();
    let (mut row, mut col, mut data) = (
        Vec::with_capacity(nnz),
        Vec::with_capacity(nnz),
        Vec::with_capacity(nnz),
    );
    for (&v, (i, j)) in matrix.iter() {
        row.push(i);
        col.push(j);
        data.push(v);
    }

    SparseContactMatrix::new(n_rows, row, col, data)
}
