//! Accumulators for merging coordinate lists
//!
//! Two strategies are used across the crate:
//! - **Dense**: sums (row, col, value) triples straight into a dense array.
//!   Used to build bulk matrices from many sparse matrices.
//! - **Sort**: collects triples, then sorts and merges duplicates. Used to
//!   bring a coordinate list into canonical (row, col) order.

pub mod bulk;
pub mod dense;
pub mod sort;

use num_traits::Num;
use std::ops::AddAssign;

/// Trait for accumulators that merge (row, col, value) triples
pub trait Accumulator<T>
where
    T: Copy + Num + AddAssign,
{
    /// Merged representation produced by the accumulator
    type Output;

    /// Reset the accumulator for reuse
    fn reset(&mut self);

    /// Accumulate a single entry
    fn accumulate(&mut self, row: usize, col: usize, val: T);

    /// Consume the accumulator and return the merged entries
    fn extract_result(self) -> Self::Output;
}

pub use bulk::BulkAggregator;
pub use dense::DenseAccumulator;
pub use sort::SortAccumulator;
