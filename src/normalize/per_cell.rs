//! Per-cell auxiliary transforms
//!
//! These run after the fitted normalizers, one matrix at a time, in the
//! order configured in the pipeline.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::constants::{SMOOTH_SIGMA, SMOOTH_TRUNCATE};
use crate::error::Result;
use crate::matrix::SparseContactMatrix;

/// A per-cell transform step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PerCellStep {
    /// Rescale to a target total (defaults to the matrix dimension)
    Coverage {
        #[serde(default)]
        scale: Option<f64>,
    },
    /// Halve the main diagonal
    HalfDiagonal,
    /// Remove the main diagonal
    ZeroDiagonal,
    /// `ln(1 + value)`
    Log1p,
    /// Gaussian blur, re-sparsified
    Smooth,
}

impl PerCellStep {
    /// Applies this step to `m`; `intra` only contributes to coverage totals
    pub fn apply(
        &self,
        m: &mut SparseContactMatrix,
        intra: Option<&SparseContactMatrix>,
        eps: f64,
    ) -> Result<()> {
        match self {
            PerCellStep::Coverage { scale } => normalize_by_coverage(m, intra, *scale, eps),
            PerCellStep::HalfDiagonal => {
                half_main_diag(m);
                Ok(())
            }
            PerCellStep::ZeroDiagonal => {
                zero_main_diag(m);
                Ok(())
            }
            PerCellStep::Log1p => {
                log1p_matrix(m);
                Ok(())
            }
            PerCellStep::Smooth => smooth_in_place(m),
        }
    }
}

/// Rescales `m` so its total (plus the paired intra total) becomes `scale`
///
/// `scale` defaults to the matrix dimension; values are multiplied by
/// `scale / (total + eps)`.
pub fn normalize_by_coverage(
    m: &mut SparseContactMatrix,
    intra: Option<&SparseContactMatrix>,
    scale: Option<f64>,
    eps: f64,
) -> Result<()> {
    let scale = scale.unwrap_or(m.n_bins() as f64);
    let total = m.sum() + intra.map_or(0.0, SparseContactMatrix::sum);
    m.scale(scale / (total + eps));
    m.check_integrity("coverage normalization")
}

/// Halves entries on the main diagonal
pub fn half_main_diag(m: &mut SparseContactMatrix) {
    m.map_values(|i, j, v| if i == j { v / 2.0 } else { v });
}

/// Removes entries on the main diagonal
pub fn zero_main_diag(m: &mut SparseContactMatrix) {
    m.map_values(|i, j, v| if i == j { 0.0 } else { v });
}

/// Replaces every value with `ln(1 + value)`
pub fn log1p_matrix(m: &mut SparseContactMatrix) {
    m.map_values(|_, _, v| v.ln_1p());
}

fn gaussian_kernel() -> Vec<f64> {
    let radius = (SMOOTH_TRUNCATE * SMOOTH_SIGMA + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|d| (-((d * d) as f64) / (2.0 * SMOOTH_SIGMA * SMOOTH_SIGMA)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Reflects an out-of-range index about the edge samples (`d c b | a b c d | c b a`)
fn mirror_index(idx: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let wrapped = idx.rem_euclid(period);
    if wrapped >= n as isize {
        (period - wrapped) as usize
    } else {
        wrapped as usize
    }
}

fn blur_axis(input: &Array2<f64>, axis: Axis, kernel: &[f64]) -> Array2<f64> {
    let radius = (kernel.len() / 2) as isize;
    let n = input.len_of(axis);
    let mut out = Array2::zeros(input.dim());
    for ((i, j), v) in out.indexed_iter_mut() {
        let pos = if axis == Axis(0) { i } else { j };
        *v = kernel
            .iter()
            .enumerate()
            .map(|(t, &w)| {
                let src = mirror_index(pos as isize + t as isize - radius, n);
                let value = if axis == Axis(0) {
                    input[[src, j]]
                } else {
                    input[[i, src]]
                };
                w * value
            })
            .sum();
    }
    out
}

/// Dense Gaussian-smoothed view of `m` (σ = 1, mirrored edges, radius 1)
///
/// The lower triangle mirrors the upper one so the result is exactly symmetric.
pub fn smooth(m: &SparseContactMatrix) -> Array2<f64> {
    let kernel = gaussian_kernel();
    let dense = m.to_dense();
    let mut blurred = blur_axis(&blur_axis(&dense, Axis(0), &kernel), Axis(1), &kernel);
    let n = blurred.nrows();
    for i in 0..n {
        for j in 0..i {
            blurred[[i, j]] = blurred[[j, i]];
        }
    }
    blurred
}

/// Replaces `m` with the non-zero entries of its smoothed view
pub fn smooth_in_place(m: &mut SparseContactMatrix) -> Result<()> {
    let blurred = smooth(m);
    let (mut row, mut col, mut data) = (Vec::new(), Vec::new(), Vec::new());
    for ((i, j), &v) in blurred.indexed_iter() {
        if i <= j && v != 0.0 {
            row.push(i);
            col.push(j);
            data.push(v);
        }
    }
    *m = SparseContactMatrix::from_upper_triangle(m.n_bins(), row, col, data)?;
    m.check_integrity("smoothing")
}
