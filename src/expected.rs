//! Expected contact values per genomic distance and observed/expected ratios

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

fn check_square(matrix: &Array2<f64>) -> Result<usize> {
    let (n_rows, n_cols) = matrix.dim();
    if n_rows != n_cols {
        return Err(Error::ShapeMismatch {
            expected: (n_rows, n_rows),
            got: (n_rows, n_cols),
        });
    }
    Ok(n_rows)
}

/// Coordinates of the `k`-th diagonal of an `n × n` matrix
///
/// Positive `k` selects diagonals above the main one, negative `k` below.
pub fn kth_diag_indices(n: usize, k: isize) -> Vec<(usize, usize)> {
    let offset = k.unsigned_abs();
    if offset >= n {
        return Vec::new();
    }
    (0..n - offset)
        .map(|i| if k >= 0 { (i, i + offset) } else { (i + offset, i) })
        .collect()
}

/// Sum of the upper diagonal at distance `k`
pub fn diagonal_sum(matrix: &Array2<f64>, k: usize) -> f64 {
    let n = matrix.nrows();
    (0..n.saturating_sub(k)).map(|i| matrix[[i, i + k]]).sum()
}

/// Mean value of each upper diagonal, indexed by distance
pub fn get_expected(matrix: &Array2<f64>) -> Result<Array1<f64>> {
    let n = check_square(matrix)?;
    Ok(Array1::from_iter(
        (0..n).map(|k| diagonal_sum(matrix, k) / (n - k) as f64),
    ))
}

/// Observed/expected matrix
///
/// Each upper diagonal is divided by its expected value (`expected[k]`, or
/// the diagonal mean when `expected` is `None`); diagonals with zero
/// expectation become 0. The lower triangle mirrors the upper one.
pub fn oe(matrix: &Array2<f64>, expected: Option<&Array1<f64>>) -> Result<Array2<f64>> {
    let n = check_square(matrix)?;
    if let Some(expected) = expected {
        if expected.len() < n {
            return Err(Error::LengthMismatch {
                what: "expected vector",
                expected: n,
                got: expected.len(),
            });
        }
    }

    let mut out = Array2::zeros((n, n));
    for k in 0..n {
        let expect = match expected {
            Some(e) => e[k],
            None => diagonal_sum(matrix, k) / (n - k) as f64,
        };
        if expect == 0.0 {
            continue;
        }
        for i in 0..n - k {
            let v = matrix[[i, i + k]] / expect;
            out[[i, i + k]] = v;
            out[[i + k, i]] = v;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_kth_diag_indices() {
        assert_eq!(kth_diag_indices(3, 0), vec![(0, 0), (1, 1), (2, 2)]);
        assert_eq!(kth_diag_indices(3, 1), vec![(0, 1), (1, 2)]);
        assert_eq!(kth_diag_indices(3, -2), vec![(2, 0)]);
        assert!(kth_diag_indices(3, 3).is_empty());
    }

    #[test]
    fn test_constant_diagonals() {
        let bulk = Array2::from_elem((4, 4), 10.0);

        let expected = get_expected(&bulk).unwrap();
        assert_eq!(expected, array![10.0, 10.0, 10.0, 10.0]);

        let ratio = oe(&bulk, Some(&expected)).unwrap();
        assert!(ratio.iter().all(|&v| (v - 1.0).abs() < 1.0e-12));
    }

    #[test]
    fn test_zero_expected_yields_zero() {
        //    [2 0 4]
        //    [0 2 0]
        //    [4 0 2]
        let m = array![[2.0, 0.0, 4.0], [0.0, 2.0, 0.0], [4.0, 0.0, 2.0]];
        let ratio = oe(&m, None).unwrap();

        assert_eq!(ratio[[0, 1]], 0.0);
        assert_eq!(ratio[[1, 0]], 0.0);
        assert_eq!(ratio[[0, 2]], 1.0);
        assert_eq!(ratio[[2, 0]], 1.0);
        assert!(ratio.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_rejects_non_square() {
        let m = Array2::<f64>::zeros((2, 3));
        assert!(matches!(get_expected(&m), Err(Error::ShapeMismatch { .. })));
        assert!(matches!(oe(&m, None), Err(Error::ShapeMismatch { .. })));
    }
}
