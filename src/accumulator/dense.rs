//! Dense accumulator for building bulk matrices
//!
//! Sums coordinate triples from any number of sparse matrices into a single
//! dense array. Memory is bounded by the output shape, work by the number of
//! accumulated triples.

use ndarray::Array2;
use num_traits::Num;
use std::ops::AddAssign;

use crate::accumulator::Accumulator;

/// Dense accumulator over an `n_rows × n_cols` grid
pub struct DenseAccumulator<T> {
    /// The dense accumulation array
    values: Array2<T>,

    /// Number of triples accumulated since the last reset
    n_accumulated: usize,
}

impl<T> DenseAccumulator<T>
where
    T: Copy + Num + AddAssign,
{
    /// Create a new dense accumulator with the given shape
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            values: Array2::zeros((n_rows, n_cols)),
            n_accumulated: 0,
        }
    }

    /// Number of triples accumulated since the last reset
    pub fn n_accumulated(&self) -> usize {
        self.n_accumulated
    }

    /// Shape of the accumulation grid
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Zero the grid for reuse without reallocating
    pub fn reset(&mut self) {
        self.values.fill(T::zero());
        self.n_accumulated = 0;
    }

    /// Add `val` at `(row, col)`
    pub fn accumulate(&mut self, row: usize, col: usize, val: T) {
        self.values[[row, col]] += val;
        self.n_accumulated += 1;
    }

    /// Consume the accumulator and return the dense sums
    pub fn extract_result(self) -> Array2<T> {
        self.values
    }
}

impl<T> Accumulator<T> for DenseAccumulator<T>
where
    T: Copy + Num + AddAssign,
{
    type Output = Array2<T>;

    fn reset(&mut self) {
        DenseAccumulator::reset(self)
    }

    fn accumulate(&mut self, row: usize, col: usize, val: T) {
        DenseAccumulator::accumulate(self, row, col, val)
    }

    fn extract_result(self) -> Array2<T> {
        DenseAccumulator::extract_result(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_accumulator_sums_duplicates() {
        let mut acc = DenseAccumulator::<f64>::new(3, 3);
        acc.accumulate(0, 1, 2.0);
        acc.accumulate(0, 1, 3.0);
        acc.accumulate(2, 2, 1.5);

        assert_eq!(acc.n_accumulated(), 3);
        let result = acc.extract_result();
        assert!((result[[0, 1]] - 5.0).abs() < 1.0e-10);
        assert!((result[[2, 2]] - 1.5).abs() < 1.0e-10);
        assert_eq!(result[[1, 0]], 0.0);
    }

    #[test]
    fn test_dense_accumulator_reset() {
        let mut acc = DenseAccumulator::<f64>::new(2, 2);
        acc.accumulate(1, 1, 4.0);
        Accumulator::reset(&mut acc);

        assert_eq!(acc.n_accumulated(), 0);
        assert!(acc.extract_result().iter().all(|&v| v == 0.0));
    }
}
