//! Banded window reformatting
//!
//! Each matrix row `i` is re-indexed so that column `j` lands at local
//! column `j - i + size_l`, keeping only a band around the diagonal. The band
//! width is `patch = min(2w + 1, N)` for an off-diagonal radius `w`; positions
//! whose global column falls outside the matrix are flagged in the mask.

use log::info;
use ndarray::{s, Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_OFF_DIAG_BP, DEFAULT_PATCH_BP, MIN_PATCH_FACTOR};
use crate::error::{Error, Result};
use crate::matrix::{total_nnz, MergedTriples, SparseContactMatrix};
use crate::utils::formats::to_sprs_csr;

/// Output container of [`reformat`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowLayout {
    /// `(N, patch, M)` dense tensor
    #[default]
    Dense,
    /// Triples with the matrix position as third coordinate
    Sparse,
}

/// Window settings; unset sizes derive from the resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Off-diagonal radius in bins
    pub off_diag: Option<usize>,

    /// Patch factor for [`slice_rearrange`]
    pub fac_size: Option<usize>,

    pub layout: WindowLayout,
}

/// Geometry of a windowed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowShape {
    pub n_bins: usize,
    pub patch: usize,
    pub size_l: usize,
    pub size_r: usize,
    pub n_matrices: usize,
}

impl WindowShape {
    pub fn new(n_bins: usize, off_diag: usize, n_matrices: usize) -> Self {
        let patch = off_diag.saturating_mul(2).saturating_add(1).min(n_bins);
        Self {
            n_bins,
            patch,
            size_l: patch / 2,
            size_r: (patch + 1) / 2,
            n_matrices,
        }
    }

    /// Local column of global entry (i, j), if it lies inside the band
    pub fn local_col(&self, i: usize, j: usize) -> Option<usize> {
        let shifted = j + self.size_l;
        if shifted >= i && shifted - i < self.size_l + self.size_r {
            Some(shifted - i)
        } else {
            None
        }
    }

    /// Global column of local position (i, c), if it lies inside the matrix
    pub fn global_col(&self, i: usize, c: usize) -> Option<usize> {
        let shifted = i + c;
        if shifted >= self.size_l && shifted < self.n_bins + self.size_l {
            Some(shifted - self.size_l)
        } else {
            None
        }
    }

    /// Validity of every `(row, local column)` position
    pub fn mask(&self) -> Array2<bool> {
        Array2::from_shape_fn((self.n_bins, self.patch), |(i, c)| {
            self.global_col(i, c).is_some()
        })
    }
}

/// Windowed values in one of the two layouts
#[derive(Debug, Clone)]
pub enum WindowedData {
    Dense(Array3<f64>),
    Sparse(MergedTriples),
}

/// Result of [`reformat`]
#[derive(Debug, Clone)]
pub struct WindowedBatch {
    pub data: WindowedData,
    pub mask: Array2<bool>,
    pub shape: WindowShape,
}

impl WindowedBatch {
    /// Rebuilds the full symmetric matrix at position `idx`
    ///
    /// Entries dropped by the band or by bin filtering stay zero. When the
    /// band is asymmetric (even patch) an entry kept only below the
    /// diagonal is mirrored upward.
    pub fn reconstruct(&self, idx: usize) -> Result<SparseContactMatrix> {
        if idx >= self.shape.n_matrices {
            return Err(Error::InvalidArgument {
                arg: "idx",
                reason: format!(
                    "matrix {} out of range for {} matrices",
                    idx, self.shape.n_matrices
                ),
            });
        }

        let mut entries: Vec<(usize, usize, f64)> = Vec::new();
        match &self.data {
            WindowedData::Dense(tensor) => {
                for ((i, c), &v) in tensor.slice(s![.., .., idx]).indexed_iter() {
                    if v != 0.0 {
                        if let Some(j) = self.shape.global_col(i, c) {
                            entries.push((i, j, v));
                        }
                    }
                }
            }
            WindowedData::Sparse(triples) => {
                let index = triples.matrix_index();
                let start = index.partition_point(|&k| (k as usize) < idx);
                let end = index.partition_point(|&k| (k as usize) <= idx);
                for pos in start..end {
                    let (i, c) = (triples.rows()[pos] as usize, triples.cols()[pos] as usize);
                    if let Some(j) = self.shape.global_col(i, c) {
                        entries.push((i, j, triples.values()[pos]));
                    }
                }
            }
        }

        let (mut row, mut col, mut data) = (Vec::new(), Vec::new(), Vec::new());
        for (i, j, v) in entries {
            let upper = if j >= i {
                Some((i, j))
            } else if i - j >= self.shape.size_r {
                Some((j, i))
            } else {
                None
            };
            if let Some((i, j)) = upper {
                row.push(i);
                col.push(j);
                data.push(v);
            }
        }
        SparseContactMatrix::from_upper_triangle(self.shape.n_bins, row, col, data)
    }
}

fn check_resolution(resolution: u64) -> Result<()> {
    if resolution == 0 {
        return Err(Error::InvalidArgument {
            arg: "resolution",
            reason: "must be positive".to_string(),
        });
    }
    Ok(())
}

/// Off-diagonal radius in bins, `off_diag` or 50 Mb at `resolution`
pub fn off_diagonal_radius(resolution: u64, off_diag: Option<usize>) -> Result<usize> {
    check_resolution(resolution)?;
    Ok(off_diag.unwrap_or((DEFAULT_OFF_DIAG_BP / resolution) as usize))
}

/// Patch factor, `fac_size` or 300 kb at `resolution`; values ≤ 2 become 1
pub fn patch_factor(resolution: u64, fac_size: Option<usize>) -> Result<usize> {
    check_resolution(resolution)?;
    let fac = fac_size.unwrap_or((DEFAULT_PATCH_BP / resolution) as usize);
    Ok(if fac <= MIN_PATCH_FACTOR { 1 } else { fac })
}

/// Reformats a collection into banded windows
///
/// # Arguments
///
/// * `matrices` - Matrices of identical shape
/// * `resolution` - Base pairs per bin, used for default sizes
/// * `config` - Radius override and output layout
/// * `valid_bins` - Entries touching an invalid bin are dropped
/// * `max_nnz` - Capacity limit for the sparse layout
///
/// # Errors
///
/// - [`Error::EmptyInput`] for an empty collection
/// - [`Error::EmptyWindow`] for zero-dimension matrices
/// - [`Error::ShapeMismatch`] if shapes disagree
/// - [`Error::LengthMismatch`] if `valid_bins` has the wrong length
/// - [`Error::CapacityExceeded`] if the sparse layout would overflow
pub fn reformat(
    matrices: &[SparseContactMatrix],
    resolution: u64,
    config: &WindowConfig,
    valid_bins: Option<&[bool]>,
    max_nnz: usize,
) -> Result<WindowedBatch> {
    let first = matrices
        .first()
        .ok_or(Error::EmptyInput("matrix collection"))?;
    let n = first.n_bins();
    if n == 0 {
        return Err(Error::EmptyWindow {
            row: 0,
            start: 0,
            end: 0,
            n_bins: 0,
        });
    }
    if let Some(m) = matrices.iter().find(|m| m.shape() != first.shape()) {
        return Err(Error::ShapeMismatch {
            expected: first.shape(),
            got: m.shape(),
        });
    }
    if let Some(valid) = valid_bins {
        if valid.len() != n {
            return Err(Error::LengthMismatch {
                what: "valid bins",
                expected: n,
                got: valid.len(),
            });
        }
    }

    let off_diag = off_diagonal_radius(resolution, config.off_diag)?;
    let shape = WindowShape::new(n, off_diag, matrices.len());
    let is_valid = |i: usize| valid_bins.map_or(true, |v| v[i]);
    info!(
        "Reformatting {} matrices into {}x{} windows",
        matrices.len(),
        shape.n_bins,
        shape.patch
    );

    let data = match config.layout {
        WindowLayout::Dense => {
            let mut tensor = Array3::zeros((n, shape.patch, matrices.len()));
            for (k, m) in matrices.iter().enumerate() {
                let csr = to_sprs_csr(m);
                for (i, row) in csr.outer_iterator().enumerate() {
                    if !is_valid(i) {
                        continue;
                    }
                    for (j, &v) in row.iter().filter(|&(j, _)| is_valid(j)) {
                        if let Some(c) = shape.local_col(i, j) {
                            tensor[[i, c, k]] = v;
                        }
                    }
                }
            }
            WindowedData::Dense(tensor)
        }
        WindowLayout::Sparse => {
            let nnz = total_nnz(matrices, max_nnz)?;
            let mut triples =
                MergedTriples::with_capacity([n, shape.patch, matrices.len()], nnz, max_nnz)?;
            for (k, m) in matrices.iter().enumerate() {
                for (i, j, v) in m.iter() {
                    if !(is_valid(i) && is_valid(j)) {
                        continue;
                    }
                    if let Some(c) = shape.local_col(i, j) {
                        triples.push(i, c, k, v)?;
                    }
                }
            }
            WindowedData::Sparse(triples)
        }
    };

    Ok(WindowedBatch {
        data,
        mask: shape.mask(),
        shape,
    })
}

/// Re-slices a dense matrix into rows of fixed width around a scaled diagonal
///
/// Row `i` keeps columns `[i/fac - size, i/fac + size + 1)` clamped to the
/// matrix, zero-padded to `min(2 * size + 1, cols)`. Matrices no wider than
/// that are returned unchanged.
///
/// # Errors
///
/// [`Error::EmptyWindow`] if a row keeps no columns, [`Error::InvalidArgument`]
/// for a zero `fac_size`.
pub fn slice_rearrange(matrix: &Array2<f64>, size: usize, fac_size: usize) -> Result<Array2<f64>> {
    if fac_size == 0 {
        return Err(Error::InvalidArgument {
            arg: "fac_size",
            reason: "must be positive".to_string(),
        });
    }
    let (n_rows, n_cols) = matrix.dim();
    let patch = size.saturating_mul(2).saturating_add(1).min(n_cols);
    if n_cols <= patch {
        return Ok(matrix.clone());
    }

    let mut out = Array2::zeros((n_rows, patch));
    for i in 0..n_rows {
        let center = i / fac_size;
        let start = center.saturating_sub(size);
        let end = (center + size + 1).min(n_rows);
        if end <= start {
            return Err(Error::EmptyWindow {
                row: i,
                start,
                end,
                n_bins: n_rows,
            });
        }
        out.slice_mut(s![i, ..end - start])
            .assign(&matrix.slice(s![i, start..end]));
    }
    Ok(out)
}
