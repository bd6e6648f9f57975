//! Batch-effect correction
//!
//! [`BatchCorrector`] rescales the windowed triples of each batch so that
//! its column profile matches a reference averaged over all batches. The
//! embedding-level helpers [`regress_out`] and [`quantile_normalize`] operate
//! on dense `samples × features` arrays instead.

use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Range;

use log::{debug, warn};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::matrix::MergedTriples;

/// How per-batch profiles are combined into the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceAverage {
    /// Arithmetic mean over batches
    #[default]
    Arithmetic,
    /// Geometric mean over the batches with a positive value
    Geometric,
}

/// Batch correction settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub reference: ReferenceAverage,

    /// Also multiply every value by its batch's row factor
    pub apply_row_factor: bool,
}

/// Factors computed for each batch
#[derive(Debug, Clone)]
pub struct BatchCorrection {
    /// `reference / batch` column profile ratio, one array per batch
    pub col_factors: Vec<Array1<f64>>,

    /// `reference / batch` row profile ratio, one array per batch
    pub row_factors: Vec<Array1<f64>>,
}

/// Column-profile batch corrector
#[derive(Debug, Clone, Default)]
pub struct BatchCorrector {
    config: BatchConfig,
}

fn reference(profiles: &[&Array1<f64>], average: ReferenceAverage, len: usize) -> Array1<f64> {
    match average {
        ReferenceAverage::Arithmetic => {
            let mut sum = Array1::zeros(len);
            for profile in profiles {
                sum += *profile;
            }
            if !profiles.is_empty() {
                sum /= profiles.len() as f64;
            }
            sum
        }
        ReferenceAverage::Geometric => Array1::from_iter((0..len).map(|c| {
            let (log_sum, count) = profiles
                .iter()
                .map(|p| p[c])
                .filter(|&v| v > 0.0)
                .fold((0.0, 0usize), |(s, n), v| (s + v.ln(), n + 1));
            if count == 0 {
                0.0
            } else {
                (log_sum / count as f64).exp()
            }
        })),
    }
}

fn ratio(reference: &Array1<f64>, profile: &Array1<f64>) -> Array1<f64> {
    Array1::from_iter(
        reference
            .iter()
            .zip(profile.iter())
            .map(|(&r, &p)| if p > 0.0 { r / p } else { 1.0 }),
    )
}

impl BatchCorrector {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    /// Rescales `triples` in place, batch by batch
    ///
    /// # Arguments
    ///
    /// * `triples` - Entries whose matrix index is non-decreasing, typically
    ///   the sparse output of the window reformatter
    /// * `batches` - Contiguous matrix-index ranges covering every matrix
    ///
    /// # Errors
    ///
    /// - [`Error::UnsortedBatchIndex`] if the matrix index decreases
    /// - [`Error::InvalidPartition`] if `batches` does not tile the matrices
    /// - [`Error::NumericIntegrity`] if a value is NaN afterwards
    pub fn correct(
        &self,
        triples: &mut MergedTriples,
        batches: &[Range<usize>],
    ) -> Result<BatchCorrection> {
        let slices = triples.batch_slices(batches)?;
        let [n_rows, n_cols, _] = triples.shape();

        let mut col_profiles = Vec::with_capacity(slices.len());
        let mut row_profiles = Vec::with_capacity(slices.len());
        for (b, slice) in slices.iter().enumerate() {
            if slice.is_empty() {
                warn!("batch {} has no stored entries; excluded from the reference", b);
                col_profiles.push(None);
                row_profiles.push(None);
                continue;
            }
            let bulk = triples.slice_to_dense(slice.clone()) / slice.len() as f64;
            col_profiles.push(bulk.mean_axis(Axis(0)));
            row_profiles.push(bulk.mean_axis(Axis(1)));
        }

        let present_cols: Vec<&Array1<f64>> = col_profiles.iter().flatten().collect();
        let present_rows: Vec<&Array1<f64>> = row_profiles.iter().flatten().collect();
        let col_reference = reference(&present_cols, self.config.reference, n_cols);
        let row_reference = reference(&present_rows, self.config.reference, n_rows);

        let col_factors: Vec<Array1<f64>> = col_profiles
            .iter()
            .map(|p| match p {
                Some(p) => ratio(&col_reference, p),
                None => Array1::ones(n_cols),
            })
            .collect();
        let row_factors: Vec<Array1<f64>> = row_profiles
            .iter()
            .map(|p| match p {
                Some(p) => ratio(&row_reference, p),
                None => Array1::ones(n_rows),
            })
            .collect();

        for (slice, (col_factor, row_factor)) in
            slices.iter().zip(col_factors.iter().zip(&row_factors))
        {
            for idx in slice.clone() {
                let (i, j) = (triples.rows()[idx] as usize, triples.cols()[idx] as usize);
                let mut factor = col_factor[j];
                if self.config.apply_row_factor {
                    factor *= row_factor[i];
                }
                triples.values_mut()[idx] *= factor;
            }
        }
        debug!("batch column factors: {:?}", col_factors);

        if let Some(pos) = triples.values().iter().position(|v| v.is_nan()) {
            return Err(Error::integrity(
                "batch correction",
                format!("entry {} is NaN", pos),
            ));
        }

        Ok(BatchCorrection {
            col_factors,
            row_factors,
        })
    }
}

fn group_rows<L: Eq + Hash>(labels: &[L], n_rows: usize) -> Result<Vec<Vec<usize>>> {
    if labels.len() != n_rows {
        return Err(Error::LengthMismatch {
            what: "sample labels",
            expected: n_rows,
            got: labels.len(),
        });
    }
    let mut slot: HashMap<&L, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (row, label) in labels.iter().enumerate() {
        let g = *slot.entry(label).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[g].push(row);
    }
    Ok(groups)
}

/// Subtracts each label group's per-feature mean from its samples
///
/// # Errors
///
/// [`Error::LengthMismatch`] if `labels` does not hold one label per row.
pub fn regress_out<L: Eq + Hash>(x: &Array2<f64>, labels: &[L]) -> Result<Array2<f64>> {
    let mut out = x.clone();
    for rows in group_rows(labels, x.nrows())? {
        let group = x.select(Axis(0), &rows);
        let Some(mean) = group.mean_axis(Axis(0)) else {
            continue;
        };
        for &r in &rows {
            let mut row = out.row_mut(r);
            row -= &mean;
        }
    }
    Ok(out)
}

/// Quantile-normalizes the samples of each label group
///
/// Within a group, the value of rank `r` in a feature is replaced by the
/// mean over features of their rank-`r` values. Tied values share the
/// smallest of their ranks.
///
/// # Errors
///
/// [`Error::LengthMismatch`] if `labels` does not hold one label per row.
pub fn quantile_normalize<L: Eq + Hash>(x: &Array2<f64>, labels: &[L]) -> Result<Array2<f64>> {
    let mut out = Array2::zeros(x.dim());
    let n_features = x.ncols();
    if n_features == 0 {
        return Ok(out);
    }

    for rows in group_rows(labels, x.nrows())? {
        let group = x.select(Axis(0), &rows);
        let sorted: Vec<Vec<f64>> = group
            .columns()
            .into_iter()
            .map(|column| {
                let mut values = column.to_vec();
                values.sort_by(f64::total_cmp);
                values
            })
            .collect();

        let rank_mean: Vec<f64> = (0..rows.len())
            .map(|r| sorted.iter().map(|column| column[r]).sum::<f64>() / n_features as f64)
            .collect();

        for (c, column) in sorted.iter().enumerate() {
            for (local, &r) in rows.iter().enumerate() {
                let value = group[[local, c]];
                let min_rank = column.partition_point(|&v| v < value);
                out[[r, c]] = rank_mean[min_rank];
            }
        }
    }
    Ok(out)
}
