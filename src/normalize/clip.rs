//! Outlier clipping against per-observation statistics
//!
//! The per-observation mean at a position is the summed count divided by the
//! number of matrices that observed anything there. The threshold is
//! `mean + s * std`, estimated per entry or per row.

use std::str::FromStr;

use log::debug;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::constants::{CLIP_INDICATOR_EPSILON, CLIP_VARIANCE_TOLERANCE, DEFAULT_CLIP_STRENGTH};
use crate::error::{Error, Result};
use crate::matrix::SparseContactMatrix;
use crate::normalize::{FitContext, Normalizer, NormalizerState};

/// Granularity of the clip statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipAxis {
    /// One threshold per matrix position
    #[default]
    Entry,
    /// One threshold per row
    Row,
}

impl FromStr for ClipAxis {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "entry" => Ok(ClipAxis::Entry),
            "row" => Ok(ClipAxis::Row),
            _ => Err(Error::unsupported("clip axis", s)),
        }
    }
}

/// Fitted clip thresholds
#[derive(Debug, Clone, PartialEq)]
pub enum ClipThreshold {
    /// Threshold per (row, col)
    Entry(Array2<f64>),
    /// Threshold per row; entry (i, j) uses the smaller of rows i and j
    Row(Array1<f64>),
}

impl ClipThreshold {
    pub(crate) fn n_bins(&self) -> usize {
        match self {
            ClipThreshold::Entry(thr) => thr.nrows(),
            ClipThreshold::Row(thr) => thr.len(),
        }
    }

    /// Threshold applied at (i, j)
    pub fn at(&self, i: usize, j: usize) -> f64 {
        match self {
            ClipThreshold::Entry(thr) => thr[[i, j]],
            ClipThreshold::Row(thr) => thr[i].min(thr[j]),
        }
    }

    pub(crate) fn clip(&self, m: &mut SparseContactMatrix) -> Result<()> {
        if let Some((i, j, v)) = m.iter().find(|&(i, j, v)| !(v.min(self.at(i, j)) > 0.0)) {
            return Err(Error::integrity(
                "clip transform",
                format!(
                    "value {} at ({}, {}) is not positive after clipping to {}",
                    v,
                    i,
                    j,
                    self.at(i, j)
                ),
            ));
        }
        m.map_values(|i, j, v| v.min(self.at(i, j)));
        m.check_integrity("clip transform")
    }

    pub(crate) fn clip_bulk(&self, bulk: &mut Array2<f64>) {
        for ((i, j), v) in bulk.indexed_iter_mut() {
            *v = v.min(self.at(i, j));
        }
    }
}

/// Clip normalizer
#[derive(Debug, Clone)]
pub struct Clip {
    axis: ClipAxis,
    s: f64,
    indicator_eps: f64,
    variance_tolerance: f64,
}

impl Default for Clip {
    fn default() -> Self {
        Self::new(ClipAxis::Entry, DEFAULT_CLIP_STRENGTH)
    }
}

impl Clip {
    pub fn new(axis: ClipAxis, s: f64) -> Self {
        Self {
            axis,
            s,
            indicator_eps: CLIP_INDICATOR_EPSILON,
            variance_tolerance: CLIP_VARIANCE_TOLERANCE,
        }
    }

    /// Overrides the guard added to the observation-indicator bulk and the
    /// tolerated negative variance
    pub fn with_tolerances(mut self, indicator_eps: f64, variance_tolerance: f64) -> Self {
        self.indicator_eps = indicator_eps;
        self.variance_tolerance = variance_tolerance;
        self
    }

    fn check_variance(&self, variance: f64) -> Result<()> {
        if variance < -self.variance_tolerance {
            return Err(Error::integrity(
                "clip fit",
                format!("estimated variance {} is negative", variance),
            ));
        }
        Ok(())
    }
}

impl Normalizer for Clip {
    fn name(&self) -> &'static str {
        "clip"
    }

    fn fit(&self, bulk: &Array2<f64>, ctx: &FitContext<'_>) -> Result<NormalizerState> {
        let observed = ctx.aggregator.aggregate_with(ctx.matrices, |_| 1.0)? + self.indicator_eps;
        let squares = ctx.aggregator.aggregate_with(ctx.matrices, |v| v * v)?;
        if observed.dim() != bulk.dim() {
            return Err(Error::ShapeMismatch {
                expected: bulk.dim(),
                got: observed.dim(),
            });
        }

        let threshold = match self.axis {
            ClipAxis::Entry => {
                let mean = bulk / &observed;
                let second = &squares / &observed;
                let mut thr = Array2::zeros(bulk.dim());
                for (t, (&mu, &m2)) in thr.iter_mut().zip(mean.iter().zip(second.iter())) {
                    let variance = m2 - mu * mu;
                    self.check_variance(variance)?;
                    *t = mu + self.s * variance.max(0.0).sqrt();
                }
                ClipThreshold::Entry(thr)
            }
            ClipAxis::Row => {
                let observed_rows = observed.sum_axis(Axis(1));
                let mean = bulk.sum_axis(Axis(1)) / &observed_rows;
                let second = squares.sum_axis(Axis(1)) / &observed_rows;
                let mut thr = Array1::zeros(mean.len());
                for (t, (&mu, &m2)) in thr.iter_mut().zip(mean.iter().zip(second.iter())) {
                    let variance = m2 - mu * mu;
                    self.check_variance(variance)?;
                    *t = mu + self.s * variance.max(0.0).sqrt();
                }
                ClipThreshold::Row(thr)
            }
        };

        debug!("clip thresholds fitted along {:?} axis (s = {})", self.axis, self.s);
        Ok(NormalizerState::Threshold(threshold))
    }
}
