//! Sparse symmetric contact matrix
//!
//! Contacts are stored as parallel `(row, col, value)` arrays with both
//! triangles materialised. Storage is always canonical: sorted by
//! (row, col), no duplicate coordinates and no explicit zeros.

use std::fmt;

use crate::accumulator::SortAccumulator;
use crate::error::{Error, Result};

/// A square, symmetric, non-negative sparse contact matrix
///
/// Every constructor validates the invariants, and every operation that
/// rewrites values either preserves symmetry by construction (functions
/// symmetric in `(i, j)`) or goes through [`mirror_upper`](Self::mirror_upper).
#[derive(Clone, PartialEq)]
pub struct SparseContactMatrix {
    n_bins: usize,
    row: Vec<usize>,
    col: Vec<usize>,
    data: Vec<f64>,
}

impl SparseContactMatrix {
    /// Creates a contact matrix from full (both triangles) coordinate lists
    ///
    /// Duplicate coordinates are summed and zero values dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::LengthMismatch`] if the arrays differ in length
    /// - [`Error::InvalidArgument`] if an index is out of bounds
    /// - [`Error::NumericIntegrity`] for negative or non-finite values, or if
    ///   the entries do not describe a symmetric matrix
    pub fn new(n_bins: usize, row: Vec<usize>, col: Vec<usize>, data: Vec<f64>) -> Result<Self> {
        validate_triples(n_bins, &row, &col, &data)?;

        let mut acc = SortAccumulator::new(data.len());
        for ((&i, &j), &v) in row.iter().zip(&col).zip(&data) {
            acc.accumulate(i, j, v);
        }
        let (row, col, data) = acc.extract_result();

        let mut matrix = Self {
            n_bins,
            row,
            col,
            data,
        };
        matrix.prune_zeros();

        if !matrix.is_symmetric() {
            return Err(Error::integrity(
                "SparseContactMatrix::new",
                "entries do not form a symmetric matrix",
            ));
        }

        Ok(matrix)
    }

    /// Creates a contact matrix from upper-triangle entries (`row <= col`)
    ///
    /// The lower triangle is produced by mirroring.
    pub fn from_upper_triangle(
        n_bins: usize,
        row: Vec<usize>,
        col: Vec<usize>,
        data: Vec<f64>,
    ) -> Result<Self> {
        validate_triples(n_bins, &row, &col, &data)?;

        if let Some(pos) = row.iter().zip(&col).position(|(&i, &j)| i > j) {
            return Err(Error::InvalidArgument {
                arg: "row",
                reason: format!(
                    "entry {} at ({}, {}) lies below the diagonal",
                    pos, row[pos], col[pos]
                ),
            });
        }

        let mut matrix = Self {
            n_bins,
            row,
            col,
            data,
        };
        matrix.mirror_upper();
        Ok(matrix)
    }

    /// Creates an empty `n_bins × n_bins` matrix
    pub fn zeros(n_bins: usize) -> Self {
        Self {
            n_bins,
            row: Vec::new(),
            col: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Number of bins (rows and columns)
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Matrix shape as `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.n_bins, self.n_bins)
    }

    /// Number of stored entries (both triangles)
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Row coordinates of stored entries
    pub fn rows(&self) -> &[usize] {
        &self.row
    }

    /// Column coordinates of stored entries
    pub fn cols(&self) -> &[usize] {
        &self.col
    }

    /// Stored values
    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// Total contact count over both triangles
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Iterates over `(row, col, value)` in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.row
            .iter()
            .zip(&self.col)
            .zip(&self.data)
            .map(|((&i, &j), &v)| (i, j, v))
    }

    /// Iterates over entries on or above the main diagonal
    pub fn upper_iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.iter().filter(|&(i, j, _)| i <= j)
    }

    /// Multiplies every value by `factor`
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.data {
            *v *= factor;
        }
    }

    /// Rewrites every value with `f(row, col, value)` and prunes zeros
    ///
    /// `f` must be symmetric in `(row, col)`; use
    /// [`map_upper`](Self::map_upper) for anything else.
    pub fn map_values<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, usize, f64) -> f64,
    {
        for ((&i, &j), v) in self.row.iter().zip(&self.col).zip(self.data.iter_mut()) {
            *v = f(i, j, *v);
        }
        self.prune_zeros();
    }

    /// Rewrites upper-triangle values with `f(row, col, value)` and mirrors
    /// the result into the lower triangle
    pub fn map_upper<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, usize, f64) -> f64,
    {
        for ((&i, &j), v) in self.row.iter().zip(&self.col).zip(self.data.iter_mut()) {
            if i <= j {
                *v = f(i, j, *v);
            }
        }
        self.mirror_upper();
    }

    /// Restores symmetry by treating the upper triangle as authoritative
    ///
    /// Lower-triangle entries are discarded and rebuilt from their upper
    /// partners; diagonal entries are kept once. Zeros are pruned.
    pub fn mirror_upper(&mut self) {
        let upper = self
            .row
            .iter()
            .zip(&self.col)
            .filter(|(i, j)| i <= j)
            .count();
        let mut acc = SortAccumulator::new(2 * upper);

        for ((&i, &j), &v) in self.row.iter().zip(&self.col).zip(&self.data) {
            if i > j || v == 0.0 {
                continue;
            }
            acc.accumulate(i, j, v);
            if i != j {
                acc.accumulate(j, i, v);
            }
        }

        let (row, col, data) = acc.extract_result();
        self.row = row;
        self.col = col;
        self.data = data;
    }

    /// Drops stored entries whose value is exactly zero
    pub fn prune_zeros(&mut self) {
        if self.data.iter().all(|&v| v != 0.0) {
            return;
        }
        let mut keep = 0;
        for idx in 0..self.data.len() {
            if self.data[idx] != 0.0 {
                self.row[keep] = self.row[idx];
                self.col[keep] = self.col[idx];
                self.data[keep] = self.data[idx];
                keep += 1;
            }
        }
        self.row.truncate(keep);
        self.col.truncate(keep);
        self.data.truncate(keep);
    }

    /// Returns true if every off-diagonal entry has an equal transposed partner
    pub fn is_symmetric(&self) -> bool {
        let mut upper: Vec<(usize, usize, f64)> = self
            .iter()
            .filter(|&(i, j, _)| i < j)
            .collect();
        let mut lower: Vec<(usize, usize, f64)> = self
            .iter()
            .filter(|&(i, j, _)| i > j)
            .map(|(i, j, v)| (j, i, v))
            .collect();

        if upper.len() != lower.len() {
            return false;
        }

        upper.sort_by_key(|&(i, j, _)| (i, j));
        lower.sort_by_key(|&(i, j, _)| (i, j));
        upper == lower
    }

    /// Checks the post-conditions of every mutating operation
    ///
    /// # Errors
    ///
    /// [`Error::NumericIntegrity`] tagged with `stage` if a value is NaN,
    /// infinite or negative, or if symmetry is broken.
    pub fn check_integrity(&self, stage: &'static str) -> Result<()> {
        if let Some((i, j, v)) = self.iter().find(|&(_, _, v)| !v.is_finite() || v < 0.0) {
            return Err(Error::integrity(
                stage,
                format!("value {} at ({}, {})", v, i, j),
            ));
        }
        if !self.is_symmetric() {
            return Err(Error::integrity(stage, "matrix is no longer symmetric"));
        }
        Ok(())
    }
}

fn validate_triples(n_bins: usize, row: &[usize], col: &[usize], data: &[f64]) -> Result<()> {
    if row.len() != data.len() {
        return Err(Error::LengthMismatch {
            what: "row coordinates",
            expected: data.len(),
            got: row.len(),
        });
    }
    if col.len() != data.len() {
        return Err(Error::LengthMismatch {
            what: "column coordinates",
            expected: data.len(),
            got: col.len(),
        });
    }
    if let Some(&idx) = row.iter().chain(col).find(|&&idx| idx >= n_bins) {
        return Err(Error::InvalidArgument {
            arg: "row/col",
            reason: format!("index {} out of bounds for {} bins", idx, n_bins),
        });
    }
    if let Some(&v) = data.iter().find(|&&v| !v.is_finite() || v < 0.0) {
        return Err(Error::integrity(
            "SparseContactMatrix::new",
            format!("value {} is negative or not finite", v),
        ));
    }
    Ok(())
}

impl fmt::Debug for SparseContactMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SparseContactMatrix {{")?;
        writeln!(f, "  bins: {}", self.n_bins)?;
        writeln!(f, "  nnz: {}", self.nnz())?;

        let max_entries = 5.min(self.nnz());
        if max_entries > 0 {
            write!(f, "  entries: ")?;
            for (i, j, v) in self.iter().take(max_entries) {
                write!(f, "({}, {}, {:?}) ", i, j, v)?;
            }
            if self.nnz() > max_entries {
                write!(f, "... ({} more)", self.nnz() - max_entries)?;
            }
            writeln!(f)?;
        }

        write!(f, "}}")
    }
}
