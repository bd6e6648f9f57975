//! Fit/transform normalizers for contact matrices
//!
//! A [`Normalizer`] fits its parameters against a dense bulk matrix and
//! returns them as a [`NormalizerState`]. The state then transforms the bulk
//! itself and every individual sparse matrix, in place.
//!
//! Available normalizers:
//! - [`CoverageScale`]: per-bin coverage correction (`SQVC`, `VC`)
//! - [`ObservedExpected`]: per-distance expectation correction (`OE`)
//! - [`Clip`]: outlier clipping against per-observation statistics

pub mod clip;
pub mod coverage_scale;
pub mod observed_expected;
pub mod per_cell;
pub mod pipeline;

use std::str::FromStr;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::accumulator::BulkAggregator;
use crate::config::Epsilons;
use crate::error::{Error, Result};
use crate::matrix::SparseContactMatrix;

pub use clip::{Clip, ClipAxis, ClipThreshold};
pub use coverage_scale::{CoverageMethod, CoverageScale};
pub use observed_expected::ObservedExpected;
pub use per_cell::PerCellStep;
pub use pipeline::{NormalizationOutcome, PerCellNormalizer};

/// Read-only inputs available while fitting
pub struct FitContext<'a> {
    /// The collection the bulk was aggregated from
    pub matrices: &'a [SparseContactMatrix],

    /// Aggregator for any additional bulk statistics
    pub aggregator: &'a BulkAggregator,
}

/// A normalizer that can be fitted against a bulk matrix
pub trait Normalizer: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Fit parameters against `bulk`
    fn fit(&self, bulk: &Array2<f64>, ctx: &FitContext<'_>) -> Result<NormalizerState>;
}

/// Parameters produced by [`Normalizer::fit`]
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizerState {
    /// Entry (i, j) is multiplied by `factors[i] * factors[j]`, then the
    /// total mass is restored
    BinScale { factors: Array1<f64> },

    /// Entry (i, j) is multiplied by `factors[|i - j|]`, then the total
    /// mass is restored
    StratumScale { factors: Array1<f64> },

    /// Entries are clipped to a threshold
    Threshold(ClipThreshold),
}

impl NormalizerState {
    fn n_bins(&self) -> usize {
        match self {
            NormalizerState::BinScale { factors } | NormalizerState::StratumScale { factors } => {
                factors.len()
            }
            NormalizerState::Threshold(thr) => thr.n_bins(),
        }
    }

    fn check_shape(&self, shape: (usize, usize)) -> Result<()> {
        let n = self.n_bins();
        if shape != (n, n) {
            return Err(Error::ShapeMismatch {
                expected: (n, n),
                got: shape,
            });
        }
        Ok(())
    }

    /// Applies the fitted parameters to a sparse matrix in place
    pub fn transform(&self, m: &mut SparseContactMatrix) -> Result<()> {
        self.check_shape(m.shape())?;
        match self {
            NormalizerState::BinScale { factors } => {
                let total = m.sum();
                m.map_values(|i, j, v| v * (factors[i] * factors[j]));
                restore_mass(m, total);
                m.check_integrity("coverage-scale transform")
            }
            NormalizerState::StratumScale { factors } => {
                let total = m.sum();
                m.map_values(|i, j, v| v * factors[i.abs_diff(j)]);
                restore_mass(m, total);
                m.check_integrity("observed/expected transform")
            }
            NormalizerState::Threshold(thr) => thr.clip(m),
        }
    }

    /// Applies the fitted parameters to a dense bulk matrix in place
    pub fn transform_bulk(&self, bulk: &mut Array2<f64>) -> Result<()> {
        self.check_shape(bulk.dim())?;
        match self {
            NormalizerState::BinScale { factors } => {
                let total = bulk.sum();
                for ((i, j), v) in bulk.indexed_iter_mut() {
                    *v *= factors[i] * factors[j];
                }
                restore_bulk_mass(bulk, total);
            }
            NormalizerState::StratumScale { factors } => {
                let total = bulk.sum();
                for ((i, j), v) in bulk.indexed_iter_mut() {
                    *v *= factors[i.abs_diff(j)];
                }
                restore_bulk_mass(bulk, total);
            }
            NormalizerState::Threshold(thr) => thr.clip_bulk(bulk),
        }
        Ok(())
    }
}

fn restore_mass(m: &mut SparseContactMatrix, total: f64) {
    let current = m.sum();
    if current > 0.0 {
        m.scale(total / current);
    }
}

fn restore_bulk_mass(bulk: &mut Array2<f64>, total: f64) {
    let current = bulk.sum();
    if current > 0.0 {
        *bulk *= total / current;
    }
}

/// Configured normalizer, as named in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum NormalizerSpec {
    /// Square-root coverage scaling
    #[serde(rename = "SQVC")]
    SquareRootCoverage,

    /// Coverage scaling
    #[serde(rename = "VC")]
    Coverage,

    /// Per-distance expectation scaling
    #[serde(rename = "OE")]
    ObservedExpected,

    /// Outlier clipping
    #[serde(rename = "clip")]
    Clip {
        #[serde(default)]
        axis: ClipAxis,
        #[serde(default = "default_clip_strength")]
        s: f64,
    },
}

fn default_clip_strength() -> f64 {
    crate::constants::DEFAULT_CLIP_STRENGTH
}

impl NormalizerSpec {
    /// Instantiates the configured normalizer with the given guards
    pub fn build(&self, eps: &Epsilons) -> Box<dyn Normalizer> {
        match self {
            NormalizerSpec::SquareRootCoverage => Box::new(
                CoverageScale::new(CoverageMethod::SquareRoot).with_epsilon(eps.bin_scale),
            ),
            NormalizerSpec::Coverage => {
                Box::new(CoverageScale::new(CoverageMethod::Vanilla).with_epsilon(eps.bin_scale))
            }
            NormalizerSpec::ObservedExpected => Box::new(ObservedExpected),
            NormalizerSpec::Clip { axis, s } => Box::new(
                Clip::new(*axis, *s)
                    .with_tolerances(eps.clip_indicator, eps.clip_variance_tolerance),
            ),
        }
    }
}

impl FromStr for NormalizerSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SQVC" => Ok(NormalizerSpec::SquareRootCoverage),
            "VC" => Ok(NormalizerSpec::Coverage),
            "OE" => Ok(NormalizerSpec::ObservedExpected),
            "clip" => Ok(NormalizerSpec::Clip {
                axis: ClipAxis::default(),
                s: default_clip_strength(),
            }),
            _ => Err(Error::unsupported("normalizer", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> SparseContactMatrix {
        SparseContactMatrix::from_upper_triangle(
            3,
            vec![0, 0, 1, 2],
            vec![0, 1, 2, 2],
            vec![2.0, 1.0, 3.0, 4.0],
        )
        .unwrap()
    }

    #[test]
    fn test_bin_scale_preserves_mass() {
        let state = NormalizerState::BinScale {
            factors: array![1.0, 0.5, 0.25],
        };
        let mut m = sample();
        let total = m.sum();

        state.transform(&mut m).unwrap();
        assert!((m.sum() - total).abs() < 1.0e-10);
        assert!(m.is_symmetric());
    }

    #[test]
    fn test_stratum_scale_zero_factor_prunes() {
        let state = NormalizerState::StratumScale {
            factors: array![1.0, 0.0, 1.0],
        };
        let mut m = sample();
        state.transform(&mut m).unwrap();

        assert!(m.iter().all(|(i, j, _)| i.abs_diff(j) != 1));
        assert!((m.sum() - 14.0).abs() < 1.0e-10);
    }

    #[test]
    fn test_transform_shape_mismatch() {
        let state = NormalizerState::BinScale {
            factors: array![1.0, 1.0],
        };
        assert!(matches!(
            state.transform(&mut sample()),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_normalizer_spec_from_str() {
        assert_eq!(
            "SQVC".parse::<NormalizerSpec>().unwrap(),
            NormalizerSpec::SquareRootCoverage
        );
        assert_eq!("VC".parse::<NormalizerSpec>().unwrap(), NormalizerSpec::Coverage);
        assert!(matches!(
            "KR".parse::<NormalizerSpec>(),
            Err(Error::UnsupportedMethod { .. })
        ));
    }

    #[test]
    fn test_normalizer_spec_deserialize() {
        let specs: Vec<NormalizerSpec> = serde_json::from_str(
            r#"[{"method": "SQVC"}, {"method": "clip", "axis": "row", "s": 3.0}, {"method": "OE"}]"#,
        )
        .unwrap();

        assert_eq!(
            specs,
            vec![
                NormalizerSpec::SquareRootCoverage,
                NormalizerSpec::Clip {
                    axis: ClipAxis::Row,
                    s: 3.0
                },
                NormalizerSpec::ObservedExpected,
            ]
        );
        assert_eq!(specs[1].build(&Epsilons::default()).name(), "clip");
    }
}
