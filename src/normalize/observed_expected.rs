//! Observed/expected normalization
//!
//! Each distance stratum is scaled by the inverse of its mean bulk value, so
//! that the distance-decay of contact frequency is removed. Total mass is
//! restored after scaling.

use log::debug;
use ndarray::Array2;

use crate::error::Result;
use crate::expected::get_expected;
use crate::normalize::{FitContext, Normalizer, NormalizerState};

/// Per-distance expectation normalizer
#[derive(Debug, Clone, Default)]
pub struct ObservedExpected;

impl Normalizer for ObservedExpected {
    fn name(&self) -> &'static str {
        "OE"
    }

    fn fit(&self, bulk: &Array2<f64>, _ctx: &FitContext<'_>) -> Result<NormalizerState> {
        let expected = get_expected(bulk)?;
        let factors = expected.mapv(|e| if e > 0.0 { e.recip() } else { 0.0 });
        debug!(
            "OE factors fitted, {} of {} strata empty",
            factors.iter().filter(|&&f| f == 0.0).count(),
            factors.len()
        );
        Ok(NormalizerState::StratumScale { factors })
    }
}
