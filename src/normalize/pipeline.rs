//! Per-cell normalization orchestrator
//!
//! Fits each configured normalizer against the bulk in order, correcting the
//! bulk after every fit, then replays the fitted states and the per-cell
//! steps on every matrix in parallel.

use log::info;
use ndarray::Array2;
use rayon::prelude::*;

use crate::accumulator::BulkAggregator;
use crate::constants::COVERAGE_EPSILON;
use crate::error::{Error, Result};
use crate::matrix::SparseContactMatrix;
use crate::normalize::{FitContext, Normalizer, NormalizerState, PerCellStep};

/// Result of a normalization pass
#[derive(Debug, Clone)]
pub struct NormalizationOutcome {
    /// The bulk after every normalizer has corrected it
    pub bulk: Array2<f64>,

    /// Fitted states, in fitting order
    pub states: Vec<NormalizerState>,
}

/// Ordered normalizers plus per-cell steps
pub struct PerCellNormalizer {
    normalizers: Vec<Box<dyn Normalizer>>,
    steps: Vec<PerCellStep>,
    aggregator: BulkAggregator,
    coverage_eps: f64,
}

impl PerCellNormalizer {
    pub fn new(normalizers: Vec<Box<dyn Normalizer>>, steps: Vec<PerCellStep>) -> Self {
        Self {
            normalizers,
            steps,
            aggregator: BulkAggregator::default(),
            coverage_eps: COVERAGE_EPSILON,
        }
    }

    pub fn with_aggregator(mut self, aggregator: BulkAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Overrides the guard added to matrix totals by coverage steps
    pub fn with_coverage_epsilon(mut self, eps: f64) -> Self {
        self.coverage_eps = eps;
        self
    }

    /// Normalizes `matrices` in place
    ///
    /// # Arguments
    ///
    /// * `matrices` - The collection to normalize
    /// * `intra` - Optional paired matrices, one per entry of `matrices`,
    ///   whose totals join the coverage step
    /// * `bulk` - Precomputed bulk; aggregated from `matrices` when `None`
    ///
    /// # Errors
    ///
    /// [`Error::LengthMismatch`] if `intra` is not paired one-to-one,
    /// [`Error::ShapeMismatch`] if any paired matrix or the supplied bulk
    /// disagrees in shape, plus any error raised while fitting or transforming.
    pub fn run(
        &self,
        matrices: &mut [SparseContactMatrix],
        intra: Option<&[SparseContactMatrix]>,
        bulk: Option<Array2<f64>>,
    ) -> Result<NormalizationOutcome> {
        check_intra(matrices, intra)?;

        let mut bulk = match bulk {
            Some(bulk) => {
                if let Some(m) = matrices.first() {
                    if bulk.dim() != m.shape() {
                        return Err(Error::ShapeMismatch {
                            expected: m.shape(),
                            got: bulk.dim(),
                        });
                    }
                }
                bulk
            }
            None => self.aggregator.aggregate(matrices)?,
        };

        let mut states = Vec::with_capacity(self.normalizers.len());
        {
            let ctx = FitContext {
                matrices: &*matrices,
                aggregator: &self.aggregator,
            };
            for normalizer in &self.normalizers {
                info!("Fitting {} normalizer", normalizer.name());
                let state = normalizer.fit(&bulk, &ctx)?;
                state.transform_bulk(&mut bulk)?;
                states.push(state);
            }
        }

        let states_ref = &states;
        let apply = |m: &mut SparseContactMatrix,
                     paired: Option<&SparseContactMatrix>|
         -> Result<()> {
            for state in states_ref {
                state.transform(m)?;
            }
            for step in &self.steps {
                step.apply(m, paired, self.coverage_eps)?;
            }
            Ok(())
        };

        match intra {
            Some(intra) => matrices
                .par_iter_mut()
                .zip(intra.par_iter())
                .try_for_each(|(m, paired)| apply(m, Some(paired)))?,
            None => matrices
                .par_iter_mut()
                .try_for_each(|m| apply(m, None))?,
        }

        info!(
            "Normalized {} matrices with {} normalizers and {} per-cell steps",
            matrices.len(),
            states.len(),
            self.steps.len()
        );
        Ok(NormalizationOutcome { bulk, states })
    }
}

fn check_intra(
    matrices: &[SparseContactMatrix],
    intra: Option<&[SparseContactMatrix]>,
) -> Result<()> {
    let Some(intra) = intra else {
        return Ok(());
    };
    if intra.len() != matrices.len() {
        return Err(Error::LengthMismatch {
            what: "intra matrices",
            expected: matrices.len(),
            got: intra.len(),
        });
    }
    for (m, paired) in matrices.iter().zip(intra) {
        if m.shape() != paired.shape() {
            return Err(Error::ShapeMismatch {
                expected: m.shape(),
                got: paired.shape(),
            });
        }
    }
    Ok(())
}
