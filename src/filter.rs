//! Bin validity filtering
//!
//! A bin is valid when its bulk marginal exceeds a small fraction of the
//! matrix dimension. Valid bins are renumbered densely; invalid bins map to
//! `None`.

use log::info;
use ndarray::{Array1, Array2, Axis};

use crate::accumulator::BulkAggregator;
use crate::constants::BIN_FILTER_FRACTION;
use crate::error::Result;
use crate::matrix::SparseContactMatrix;
use crate::utils::compact_index;

/// Per-axis bin mappings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinFilter {
    /// Compacted index of each row bin, `None` if invalid
    pub row_mapping: Vec<Option<usize>>,

    /// Number of valid row bins
    pub n_rows_valid: usize,

    /// Compacted index of each column bin, `None` if invalid
    pub col_mapping: Vec<Option<usize>>,

    /// Number of valid column bins
    pub n_cols_valid: usize,
}

impl BinFilter {
    /// Validity flag per row bin
    pub fn valid_rows(&self) -> Vec<bool> {
        self.row_mapping.iter().map(Option::is_some).collect()
    }

    /// Validity flag per column bin
    pub fn valid_cols(&self) -> Vec<bool> {
        self.col_mapping.iter().map(Option::is_some).collect()
    }
}

fn mapping(marginal: &Array1<f64>, dimension: usize) -> (Vec<Option<usize>>, usize) {
    let threshold = (BIN_FILTER_FRACTION * dimension as f64).max(0.0);
    let flags: Vec<bool> = marginal.iter().map(|&c| c > threshold).collect();
    let (mapping, n_valid) = compact_index(&flags);
    info!("{} out of {} bins are valid", n_valid, flags.len());
    (mapping, n_valid)
}

/// Classifies bins by their bulk marginals
///
/// # Arguments
///
/// * `bulk` - Dense bulk matrix
/// * `symmetric` - Reuse the row mapping for columns instead of computing
///   column marginals
pub fn filter_bins(bulk: &Array2<f64>, symmetric: bool) -> BinFilter {
    let (n_rows, n_cols) = bulk.dim();
    let (row_mapping, n_rows_valid) = mapping(&bulk.sum_axis(Axis(1)), n_cols);
    let (col_mapping, n_cols_valid) = if symmetric {
        (row_mapping.clone(), n_rows_valid)
    } else {
        mapping(&bulk.sum_axis(Axis(0)), n_rows)
    };

    BinFilter {
        row_mapping,
        n_rows_valid,
        col_mapping,
        n_cols_valid,
    }
}

/// Aggregates `matrices` and classifies bins of the resulting bulk
pub fn filter_bins_from_matrices(
    matrices: &[SparseContactMatrix],
    aggregator: &BulkAggregator,
    symmetric: bool,
) -> Result<BinFilter> {
    let bulk = aggregator.aggregate(matrices)?;
    Ok(filter_bins(&bulk, symmetric))
}
