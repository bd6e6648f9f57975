//! Global sparse triple list spanning a whole matrix collection
//!
//! Entries carry a third coordinate, the index of the matrix they belong to.
//! Coordinates are encoded as `u32`, which bounds both the dimensions and
//! the total number of entries.

use std::ops::Range;

use ndarray::Array2;

use crate::constants::MAX_ENCODED_NNZ;
use crate::error::{Error, Result};
use crate::matrix::SparseContactMatrix;

/// `(row, col, matrix-index, value)` entries of many matrices
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTriples {
    rows: Vec<u32>,
    cols: Vec<u32>,
    index: Vec<u32>,
    values: Vec<f64>,
    shape: [usize; 3],
    limit: usize,
}

impl MergedTriples {
    /// Creates an empty triple list for `shape = [rows, cols, matrices]`
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] if a dimension or `nnz` does not fit the
    /// encoding, or if `nnz` exceeds `limit`.
    pub fn with_capacity(shape: [usize; 3], nnz: usize, limit: usize) -> Result<Self> {
        let limit = limit.min(MAX_ENCODED_NNZ);
        if let Some(&dim) = shape.iter().find(|&&d| d > MAX_ENCODED_NNZ) {
            return Err(Error::CapacityExceeded {
                requested: dim,
                limit: MAX_ENCODED_NNZ,
            });
        }
        if nnz > limit {
            return Err(Error::CapacityExceeded {
                requested: nnz,
                limit,
            });
        }

        Ok(Self {
            rows: Vec::with_capacity(nnz),
            cols: Vec::with_capacity(nnz),
            index: Vec::with_capacity(nnz),
            values: Vec::with_capacity(nnz),
            shape,
            limit,
        })
    }

    /// Merges the entries of `matrices` in order, tagging each with its position
    pub fn from_matrices(matrices: &[SparseContactMatrix], limit: usize) -> Result<Self> {
        let first = matrices
            .first()
            .ok_or(Error::EmptyInput("matrix collection"))?;
        let nnz = total_nnz(matrices, limit)?;

        let mut merged =
            Self::with_capacity([first.n_bins(), first.n_bins(), matrices.len()], nnz, limit)?;
        for (k, m) in matrices.iter().enumerate() {
            if m.shape() != first.shape() {
                return Err(Error::ShapeMismatch {
                    expected: first.shape(),
                    got: m.shape(),
                });
            }
            for (i, j, v) in m.iter() {
                merged.push(i, j, k, v)?;
            }
        }
        Ok(merged)
    }

    /// Appends one entry
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if a coordinate lies outside the declared shape
    /// - [`Error::CapacityExceeded`] if the list is full
    pub fn push(&mut self, row: usize, col: usize, matrix: usize, value: f64) -> Result<()> {
        if row >= self.shape[0] || col >= self.shape[1] || matrix >= self.shape[2] {
            return Err(Error::InvalidArgument {
                arg: "coordinate",
                reason: format!(
                    "({}, {}, {}) outside shape {:?}",
                    row, col, matrix, self.shape
                ),
            });
        }
        if self.values.len() >= self.limit {
            return Err(Error::CapacityExceeded {
                requested: self.values.len() + 1,
                limit: self.limit,
            });
        }
        self.rows.push(row as u32);
        self.cols.push(col as u32);
        self.index.push(matrix as u32);
        self.values.push(value);
        Ok(())
    }

    /// `[rows, cols, matrices]`
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no entries are stored
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Row coordinates
    pub fn rows(&self) -> &[u32] {
        &self.rows
    }

    /// Column coordinates
    pub fn cols(&self) -> &[u32] {
        &self.cols
    }

    /// Matrix-index coordinates
    pub fn matrix_index(&self) -> &[u32] {
        &self.index
    }

    /// Stored values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable access to stored values; coordinates stay fixed
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Iterates over `(row, col, matrix, value)`
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, usize, f64)> + '_ {
        self.rows
            .iter()
            .zip(&self.cols)
            .zip(&self.index)
            .zip(&self.values)
            .map(|(((&i, &j), &k), &v)| (i as usize, j as usize, k as usize, v))
    }

    /// Verifies that the matrix index never decreases along the entries
    pub fn check_sorted(&self) -> Result<()> {
        match self.index.windows(2).position(|w| w[1] < w[0]) {
            Some(pos) => Err(Error::UnsortedBatchIndex { position: pos + 1 }),
            None => Ok(()),
        }
    }

    /// Converts contiguous matrix-index ranges into ranges over stored entries
    ///
    /// # Errors
    ///
    /// [`Error::UnsortedBatchIndex`] if the index is not sorted and
    /// [`Error::InvalidPartition`] if the ranges are not contiguous from 0.
    pub fn batch_slices(&self, batches: &[Range<usize>]) -> Result<Vec<Range<usize>>> {
        self.check_sorted()?;
        check_partition(batches, self.shape[2])?;

        let mut slices = Vec::with_capacity(batches.len());
        let mut start = 0;
        for batch in batches {
            let stop = batch.end as u32;
            let end = self.index.partition_point(|&k| k < stop);
            slices.push(start..end);
            start = end;
        }
        Ok(slices)
    }

    /// Sums the entries in `range` into a dense `rows × cols` array
    pub fn slice_to_dense(&self, range: Range<usize>) -> Array2<f64> {
        let mut dense = Array2::zeros((self.shape[0], self.shape[1]));
        for idx in range {
            dense[[self.rows[idx] as usize, self.cols[idx] as usize]] += self.values[idx];
        }
        dense
    }
}

/// Total stored entries of a collection, checked against `limit`
pub fn total_nnz(matrices: &[SparseContactMatrix], limit: usize) -> Result<usize> {
    let limit = limit.min(MAX_ENCODED_NNZ);
    let nnz = matrices
        .iter()
        .try_fold(0usize, |acc, m| acc.checked_add(m.nnz()))
        .ok_or(Error::CapacityExceeded {
            requested: usize::MAX,
            limit,
        })?;
    if nnz > limit {
        return Err(Error::CapacityExceeded {
            requested: nnz,
            limit,
        });
    }
    Ok(nnz)
}

/// Checks that `groups` are non-empty-start, contiguous ranges covering `0..n`
pub fn check_partition(groups: &[Range<usize>], n: usize) -> Result<()> {
    let mut expected_start = 0;
    for group in groups {
        if group.start != expected_start || group.end < group.start {
            return Err(Error::InvalidPartition(format!(
                "range {:?} does not continue from {}",
                group, expected_start
            )));
        }
        expected_start = group.end;
    }
    if expected_start != n {
        return Err(Error::InvalidPartition(format!(
            "ranges cover 0..{} but the collection holds {} matrices",
            expected_start, n
        )));
    }
    Ok(())
}

/// Builds contiguous ranges from a per-matrix group label vector
///
/// # Errors
///
/// [`Error::UnsortedBatchIndex`] if equal labels are not adjacent.
pub fn partition_from_labels<L: PartialEq>(labels: &[L]) -> Result<Vec<Range<usize>>> {
    let mut groups: Vec<Range<usize>> = Vec::new();
    let mut start = 0;
    for idx in 1..=labels.len() {
        if idx == labels.len() || labels[idx] != labels[start] {
            if labels[..start].contains(&labels[start]) {
                return Err(Error::UnsortedBatchIndex { position: start });
            }
            groups.push(start..idx);
            start = idx;
        }
    }
    Ok(groups)
}
