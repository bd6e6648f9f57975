//! Coverage-scale normalization (vanilla coverage and its square root)

use std::str::FromStr;

use log::debug;
use ndarray::{Array2, Axis};

use crate::constants::BIN_SCALE_EPSILON;
use crate::error::{Error, Result};
use crate::normalize::{FitContext, Normalizer, NormalizerState};

/// Exponent applied to the per-bin coverage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageMethod {
    /// `SQVC`: coverage^-0.5
    SquareRoot,
    /// `VC`: coverage^-1
    Vanilla,
}

impl FromStr for CoverageMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SQVC" => Ok(CoverageMethod::SquareRoot),
            "VC" => Ok(CoverageMethod::Vanilla),
            _ => Err(Error::unsupported("coverage method", s)),
        }
    }
}

/// Per-bin coverage normalizer
#[derive(Debug, Clone)]
pub struct CoverageScale {
    method: CoverageMethod,
    eps: f64,
}

impl CoverageScale {
    pub fn new(method: CoverageMethod) -> Self {
        Self {
            method,
            eps: BIN_SCALE_EPSILON,
        }
    }

    /// Parses the method name (`SQVC` or `VC`)
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(Self::new(name.parse()?))
    }

    /// Overrides the divide-by-zero guard added to each bin's coverage
    pub fn with_epsilon(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }
}

impl Normalizer for CoverageScale {
    fn name(&self) -> &'static str {
        match self.method {
            CoverageMethod::SquareRoot => "SQVC",
            CoverageMethod::Vanilla => "VC",
        }
    }

    fn fit(&self, bulk: &Array2<f64>, _ctx: &FitContext<'_>) -> Result<NormalizerState> {
        let coverage = bulk.sum_axis(Axis(0)) + self.eps;
        let factors = match self.method {
            CoverageMethod::SquareRoot => coverage.mapv(|c| c.powf(-0.5)),
            CoverageMethod::Vanilla => coverage.mapv(f64::recip),
        };
        debug!(
            "{} factors fitted for {} bins",
            self.name(),
            factors.len()
        );
        Ok(NormalizerState::BinScale { factors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::BulkAggregator;
    use ndarray::array;

    fn ctx(aggregator: &BulkAggregator) -> FitContext<'_> {
        FitContext {
            matrices: &[],
            aggregator,
        }
    }

    #[test]
    fn test_sqvc_factors() {
        let bulk = array![[3.0, 1.0], [1.0, 8.0]];
        let aggregator = BulkAggregator::default();
        let state = CoverageScale::new(CoverageMethod::SquareRoot)
            .with_epsilon(0.0)
            .fit(&bulk, &ctx(&aggregator))
            .unwrap();

        match state {
            NormalizerState::BinScale { factors } => {
                assert!((factors[0] - 0.5).abs() < 1.0e-12);
                assert!((factors[1] - 1.0 / 3.0).abs() < 1.0e-12);
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_vc_equalises_bulk_coverage() {
        let mut bulk = array![[4.0, 2.0, 0.0], [2.0, 1.0, 1.0], [0.0, 1.0, 6.0]];
        let total = bulk.sum();
        let aggregator = BulkAggregator::default();
        let state = CoverageScale::from_name("VC")
            .unwrap()
            .fit(&bulk, &ctx(&aggregator))
            .unwrap();

        state.transform_bulk(&mut bulk).unwrap();
        assert!((bulk.sum() - total).abs() < 1.0e-9);
        assert!((bulk[[0, 1]] - bulk[[1, 0]]).abs() < 1.0e-12);
    }

    #[test]
    fn test_unknown_method() {
        assert!(matches!(
            CoverageScale::from_name("OE"),
            Err(Error::UnsupportedMethod { .. })
        ));
    }
}
