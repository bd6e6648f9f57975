//! Sort-based accumulator for canonical coordinate lists
//!
//! Collects triples in arbitrary order, then sorts them by (row, col) and
//! merges duplicate coordinates by summing their values. This is how every
//! [`SparseContactMatrix`](crate::matrix::SparseContactMatrix) reaches its
//! canonical storage order.

use num_traits::Num;
use std::ops::AddAssign;

use crate::accumulator::Accumulator;

/// Canonical coordinate list: `(rows, cols, values)` sorted by (row, col)
pub type Triples<T> = (Vec<usize>, Vec<usize>, Vec<T>);

/// Sort-based accumulator for coordinate triples
pub struct SortAccumulator<T> {
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<T>,
}

impl<T> SortAccumulator<T>
where
    T: Copy + Num + AddAssign,
{
    /// Create a new sort-based accumulator
    ///
    /// # Arguments
    ///
    /// * `initial_capacity` - Initial capacity for the temporary storage
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(initial_capacity),
            cols: Vec::with_capacity(initial_capacity),
            values: Vec::with_capacity(initial_capacity),
        }
    }

    /// Reset the accumulator for reuse without reallocating memory
    pub fn reset(&mut self) {
        self.rows.clear();
        self.cols.clear();
        self.values.clear();
    }

    /// Append a single entry
    pub fn accumulate(&mut self, row: usize, col: usize, val: T) {
        self.rows.push(row);
        self.cols.push(col);
        self.values.push(val);
    }

    /// Sort by (row, col) and merge duplicate coordinates
    pub fn extract_result(self) -> Triples<T> {
        if self.rows.is_empty() {
            return (Vec::new(), Vec::new(), Vec::new());
        }

        // Stable sort keeps the summation order of duplicates deterministic
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by_key(|&i| (self.rows[i], self.cols[i]));

        let mut out_rows = Vec::with_capacity(order.len());
        let mut out_cols = Vec::with_capacity(order.len());
        let mut out_vals = Vec::with_capacity(order.len());

        let mut current = (self.rows[order[0]], self.cols[order[0]]);
        let mut current_val = self.values[order[0]];

        for &idx in order.iter().skip(1) {
            let key = (self.rows[idx], self.cols[idx]);
            if key == current {
                current_val += self.values[idx];
            } else {
                out_rows.push(current.0);
                out_cols.push(current.1);
                out_vals.push(current_val);
                current = key;
                current_val = self.values[idx];
            }
        }

        out_rows.push(current.0);
        out_cols.push(current.1);
        out_vals.push(current_val);

        (out_rows, out_cols, out_vals)
    }
}

impl<T> Accumulator<T> for SortAccumulator<T>
where
    T: Copy + Num + AddAssign,
{
    type Output = Triples<T>;

    fn reset(&mut self) {
        SortAccumulator::reset(self)
    }

    fn accumulate(&mut self, row: usize, col: usize, val: T) {
        SortAccumulator::accumulate(self, row, col, val)
    }

    fn extract_result(self) -> Triples<T> {
        SortAccumulator::extract_result(self)
    }
}
