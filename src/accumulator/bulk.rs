//! Bulk aggregation of sparse contact matrices
//!
//! Computes the dense element-wise mean of a collection. The output is split
//! into bands of rows and each band is filled by one task. Storage is sorted
//! by row, so a matrix's entries for a band are found by binary search and
//! every stored entry is visited once. Within a band, matrices are added in
//! collection order, so floating-point rounding does not depend on how the
//! thread pool schedules the bands.

use log::info;
use ndarray::{Array2, ArrayViewMut2, Axis};
use rayon::prelude::*;

use crate::accumulator::DenseAccumulator;
use crate::constants::{DEFAULT_AGGREGATION_CHUNK, MAX_ENCODED_NNZ};
use crate::error::{Error, Result};
use crate::matrix::{total_nnz, SparseContactMatrix};

/// Aggregates matrix collections into dense bulk matrices
#[derive(Debug, Clone)]
pub struct BulkAggregator {
    /// Largest total number of stored entries accepted
    pub max_nnz: usize,

    /// Output rows filled by one parallel task
    pub chunk_size: usize,
}

impl Default for BulkAggregator {
    fn default() -> Self {
        Self {
            max_nnz: MAX_ENCODED_NNZ,
            chunk_size: DEFAULT_AGGREGATION_CHUNK,
        }
    }
}

impl BulkAggregator {
    /// Create an aggregator with explicit limits
    pub fn new(max_nnz: usize, chunk_size: usize) -> Self {
        Self {
            max_nnz,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Returns `(1/N) Σ m_i` as a dense matrix
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyInput`] for an empty collection
    /// - [`Error::ShapeMismatch`] if the matrices disagree in shape
    /// - [`Error::CapacityExceeded`] if the total stored entries exceed `max_nnz`
    pub fn aggregate(&self, matrices: &[SparseContactMatrix]) -> Result<Array2<f64>> {
        self.aggregate_with(matrices, |v| v)
    }

    /// Like [`aggregate`](Self::aggregate) but sums `f(value)` instead of `value`
    pub fn aggregate_with<F>(&self, matrices: &[SparseContactMatrix], f: F) -> Result<Array2<f64>>
    where
        F: Fn(f64) -> f64 + Sync,
    {
        let first = matrices
            .first()
            .ok_or(Error::EmptyInput("matrix collection"))?;
        let shape = first.shape();
        if let Some(m) = matrices.iter().find(|m| m.shape() != shape) {
            return Err(Error::ShapeMismatch {
                expected: shape,
                got: m.shape(),
            });
        }
        let nnz = total_nnz(matrices, self.max_nnz)?;
        info!(
            "Aggregating {} matrices ({} stored entries) into a {}x{} bulk",
            matrices.len(),
            nnz,
            shape.0,
            shape.1
        );

        let band_rows = self.chunk_size.max(1);
        let mut bulk = Array2::<f64>::zeros(shape);
        let bands: Vec<(usize, ArrayViewMut2<'_, f64>)> = bulk
            .axis_chunks_iter_mut(Axis(0), band_rows)
            .enumerate()
            .map(|(b, view)| (b * band_rows, view))
            .collect();

        bands.into_par_iter().for_each(|(start, mut out)| {
            let end = start + out.nrows();
            let mut acc = DenseAccumulator::new(out.nrows(), shape.1);
            for m in matrices {
                let rows = m.rows();
                let lo = rows.partition_point(|&r| r < start);
                let hi = rows.partition_point(|&r| r < end);
                let cols = &m.cols()[lo..hi];
                let values = &m.values()[lo..hi];
                for ((&i, &j), &v) in rows[lo..hi].iter().zip(cols).zip(values) {
                    acc.accumulate(i - start, j, f(v));
                }
            }
            out.assign(&acc.extract_result());
        });

        bulk /= matrices.len() as f64;
        Ok(bulk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(scale: f64) -> SparseContactMatrix {
        SparseContactMatrix::from_upper_triangle(
            3,
            vec![0, 0, 1],
            vec![0, 2, 1],
            vec![1.0 * scale, 2.0 * scale, 3.0 * scale],
        )
        .unwrap()
    }

    #[test]
    fn test_aggregate_mean() {
        let bulk = BulkAggregator::default()
            .aggregate(&[sample(1.0), sample(3.0)])
            .unwrap();

        assert!((bulk[[0, 0]] - 2.0).abs() < 1.0e-12);
        assert!((bulk[[0, 2]] - 4.0).abs() < 1.0e-12);
        assert!((bulk[[2, 0]] - 4.0).abs() < 1.0e-12);
        assert!((bulk[[1, 1]] - 6.0).abs() < 1.0e-12);
        assert_eq!(bulk[[1, 2]], 0.0);
    }

    #[test]
    fn test_aggregate_with_indicator() {
        let empty = SparseContactMatrix::zeros(3);
        let bulk = BulkAggregator::default()
            .aggregate_with(&[sample(5.0), empty], |_| 1.0)
            .unwrap();

        assert!((bulk[[0, 0]] - 0.5).abs() < 1.0e-12);
        assert_eq!(bulk[[2, 2]], 0.0);
    }

    #[test]
    fn test_band_size_does_not_change_result() {
        let matrices: Vec<_> = (1..=10).map(|k| sample(k as f64 * 0.1)).collect();

        let a = BulkAggregator::new(usize::MAX, 1).aggregate(&matrices).unwrap();
        let b = BulkAggregator::new(usize::MAX, 2).aggregate(&matrices).unwrap();
        let c = BulkAggregator::new(usize::MAX, 64).aggregate(&matrices).unwrap();

        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_aggregate_errors() {
        let aggregator = BulkAggregator::default();
        assert!(matches!(
            aggregator.aggregate(&[]),
            Err(Error::EmptyInput(_))
        ));
        assert!(matches!(
            aggregator.aggregate(&[sample(1.0), SparseContactMatrix::zeros(4)]),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            BulkAggregator::new(3, 1).aggregate(&[sample(1.0)]),
            Err(Error::CapacityExceeded { .. })
        ));
    }
}
