//! Stratified binomial downsampling
//!
//! Groups of matrices are thinned so that, per distance stratum (or
//! globally), every group's bulk matches the shallowest group. Each stored
//! upper-triangle count `c` is replaced by a draw from `Binomial(⌊c⌋, p)` and
//! the lower triangle is rebuilt by mirroring.
//!
//! Every matrix draws from its own `ChaCha8Rng`, seeded with the configured
//! seed and using the matrix position as stream, so results do not depend on
//! how rayon schedules the work.

use std::ops::Range;
use std::str::FromStr;

use log::{debug, info, warn};
use ndarray::{array, Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Binomial;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::accumulator::BulkAggregator;
use crate::constants::{DEFAULT_SEED, RATE_TOLERANCE};
use crate::error::{Error, Result};
use crate::matrix::{check_partition, SparseContactMatrix};

/// Granularity of the depth comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownsampleMode {
    /// One rate per group
    Global,
    /// One rate per group and genomic distance
    #[default]
    Stratum,
}

impl FromStr for DownsampleMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "global" => Ok(DownsampleMode::Global),
            "stratum" => Ok(DownsampleMode::Stratum),
            _ => Err(Error::unsupported("downsample mode", s)),
        }
    }
}

/// How the common target depth is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateMode {
    /// The smallest positive depth over groups
    #[default]
    Minimum,
}

impl FromStr for RateMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "minimum" => Ok(RateMode::Minimum),
            _ => Err(Error::unsupported("rate mode", s)),
        }
    }
}

/// Downsampling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownsampleConfig {
    pub mode: DownsampleMode,
    pub rate_mode: RateMode,
    pub seed: u64,
}

impl Default for DownsampleConfig {
    fn default() -> Self {
        Self {
            mode: DownsampleMode::default(),
            rate_mode: RateMode::default(),
            seed: DEFAULT_SEED,
        }
    }
}

/// Summary of a downsampling pass
#[derive(Debug, Clone)]
pub struct DownsampleReport {
    /// Target depth per stratum (one entry in global mode); `None` where no
    /// group has any contacts
    pub targets: Vec<Option<f64>>,

    /// Thinning rate per group and stratum; `None` where the group is empty
    pub rates: Vec<Vec<Option<f64>>>,

    /// Number of strata without a target
    pub empty_strata: usize,

    /// Groups left untouched because every rate was 1 or the group is empty
    pub skipped_groups: Vec<usize>,

    /// Per-group bulks after thinning
    pub bulks: Vec<Array2<f64>>,

    /// Total of each post-thinning bulk
    pub library_sizes: Vec<f64>,
}

/// Contact totals per distance, `Σ_{|i-j| = k} bulk[i, j]` over both triangles
pub fn stratum_totals(bulk: &Array2<f64>) -> Result<Array1<f64>> {
    let (n_rows, n_cols) = bulk.dim();
    if n_rows != n_cols {
        return Err(Error::ShapeMismatch {
            expected: (n_rows, n_rows),
            got: (n_rows, n_cols),
        });
    }

    let mut totals = Array1::zeros(n_rows);
    for ((i, j), &v) in bulk.indexed_iter() {
        totals[i.abs_diff(j)] += v;
    }
    Ok(totals)
}

/// Replaces each upper-triangle count with a binomial draw and mirrors
///
/// `rate(i, j)` must lie in `[0, 1]`.
fn thin<F>(m: &mut SparseContactMatrix, rate: F, rng: &mut ChaCha8Rng) -> Result<()>
where
    F: Fn(usize, usize) -> f64,
{
    let mut failure = None;
    m.map_upper(|i, j, v| {
        let p = rate(i, j);
        match Binomial::new(v.floor() as u64, p) {
            Ok(dist) => rng.sample(dist) as f64,
            Err(e) => {
                failure.get_or_insert_with(|| format!("rate {} at ({}, {}): {}", p, i, j, e));
                v
            }
        }
    });
    if let Some(reason) = failure {
        return Err(Error::integrity("binomial thinning", reason));
    }
    m.check_integrity("binomial thinning")
}

fn matrix_rng(seed: u64, index: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(index as u64);
    rng
}

/// Per-group depth equalisation
#[derive(Debug, Clone)]
pub struct StratifiedDownsampler {
    mode: DownsampleMode,
    rate_mode: RateMode,
    seed: u64,
    aggregator: BulkAggregator,
}

impl Default for StratifiedDownsampler {
    fn default() -> Self {
        Self::new(&DownsampleConfig::default())
    }
}

impl StratifiedDownsampler {
    pub fn new(config: &DownsampleConfig) -> Self {
        Self {
            mode: config.mode,
            rate_mode: config.rate_mode,
            seed: config.seed,
            aggregator: BulkAggregator::default(),
        }
    }

    pub fn with_aggregator(mut self, aggregator: BulkAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Bulk per group; an empty group contributes a zero bulk
    fn group_bulks(
        &self,
        matrices: &[SparseContactMatrix],
        groups: &[Range<usize>],
    ) -> Result<Vec<Array2<f64>>> {
        let shape = matrices.first().map(SparseContactMatrix::shape);
        groups
            .iter()
            .enumerate()
            .map(|(g, group)| {
                if group.is_empty() {
                    warn!("group {} is empty; left out of the target depth", g);
                    let shape = shape.ok_or(Error::EmptyInput("matrix collection"))?;
                    return Ok(Array2::zeros(shape));
                }
                self.aggregator.aggregate(&matrices[group.clone()])
            })
            .collect()
    }

    fn observed(&self, bulk: &Array2<f64>) -> Result<Array1<f64>> {
        match self.mode {
            DownsampleMode::Global => Ok(array![bulk.sum()]),
            DownsampleMode::Stratum => stratum_totals(bulk),
        }
    }

    fn targets(&self, observed: &[Array1<f64>]) -> Vec<Option<f64>> {
        let n_strata = observed.first().map_or(0, Array1::len);
        match self.rate_mode {
            RateMode::Minimum => (0..n_strata)
                .map(|k| {
                    observed
                        .iter()
                        .map(|obs| obs[k])
                        .filter(|&o| o > 0.0)
                        .reduce(f64::min)
                })
                .collect(),
        }
    }

    /// Thins every group down to the common target depth
    ///
    /// # Arguments
    ///
    /// * `matrices` - The collection, modified in place
    /// * `groups` - Contiguous ranges of `matrices` covering the collection
    /// * `bulks` - Precomputed per-group bulks; aggregated when `None`
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPartition`] if `groups` does not tile the collection
    /// - [`Error::LengthMismatch`] / [`Error::ShapeMismatch`] for bad `bulks`
    /// - [`Error::NumericIntegrity`] if a rate falls outside (0, 1] or a
    ///   thinned matrix fails its integrity check
    pub fn downsample(
        &self,
        matrices: &mut [SparseContactMatrix],
        groups: &[Range<usize>],
        bulks: Option<Vec<Array2<f64>>>,
    ) -> Result<DownsampleReport> {
        check_partition(groups, matrices.len())?;

        let bulks = match bulks {
            Some(bulks) => {
                if bulks.len() != groups.len() {
                    return Err(Error::LengthMismatch {
                        what: "group bulks",
                        expected: groups.len(),
                        got: bulks.len(),
                    });
                }
                if let Some(shape) = matrices.first().map(SparseContactMatrix::shape) {
                    if let Some(b) = bulks.iter().find(|b| b.dim() != shape) {
                        return Err(Error::ShapeMismatch {
                            expected: shape,
                            got: b.dim(),
                        });
                    }
                }
                bulks
            }
            None => self.group_bulks(matrices, groups)?,
        };

        let observed = bulks
            .iter()
            .map(|bulk| self.observed(bulk))
            .collect::<Result<Vec<_>>>()?;
        let targets = self.targets(&observed);
        let empty_strata = targets.iter().filter(|t| t.is_none()).count();
        info!(
            "{} of {} strata have no contacts in any group",
            empty_strata,
            targets.len()
        );

        let mut rates = Vec::with_capacity(groups.len());
        let mut skipped_groups = Vec::new();
        for (g, (group, obs)) in groups.iter().zip(&observed).enumerate() {
            let rate: Vec<Option<f64>> = targets
                .iter()
                .zip(obs.iter())
                .map(|(&t, &o)| t.filter(|_| o > 0.0).map(|t| t / o))
                .collect();

            let out_of_range = rate.iter().enumerate().find_map(|(k, r)| {
                r.filter(|&r| !(r > 0.0 && r <= 1.0 + RATE_TOLERANCE))
                    .map(|r| (k, r))
            });
            if let Some((k, r)) = out_of_range {
                return Err(Error::integrity(
                    "downsample rates",
                    format!("group {} stratum {} has rate {}", g, k, r),
                ));
            }

            if rate.iter().flatten().all(|&r| (r - 1.0).abs() <= RATE_TOLERANCE) {
                debug!("group {} already at target depth, skipping", g);
                skipped_groups.push(g);
                rates.push(rate);
                continue;
            }
            debug!("group {} rates: {:?}", g, rate);

            let probability: Vec<f64> = rate.iter().map(|r| r.unwrap_or(1.0).min(1.0)).collect();
            let mode = self.mode;
            let rate_at = |i: usize, j: usize| match mode {
                DownsampleMode::Global => probability[0],
                DownsampleMode::Stratum => probability[i.abs_diff(j)],
            };

            let seed = self.seed;
            matrices[group.clone()]
                .par_iter_mut()
                .enumerate()
                .try_for_each(|(offset, m)| {
                    let mut rng = matrix_rng(seed, group.start + offset);
                    thin(m, &rate_at, &mut rng)
                })?;
            rates.push(rate);
        }

        let bulks = self.group_bulks(matrices, groups)?;
        let library_sizes: Vec<f64> = bulks.iter().map(|b| b.sum()).collect();
        info!(
            "library sizes = {}",
            library_sizes
                .iter()
                .map(|s| format!("{:.2e}", s))
                .collect::<Vec<_>>()
                .join(" ")
        );

        Ok(DownsampleReport {
            targets,
            rates,
            empty_strata,
            skipped_groups,
            bulks,
            library_sizes,
        })
    }
}

/// Thins every matrix whose total exceeds `count` down to about `count`
///
/// Uses a single rate `count / total` per matrix with the same mirroring
/// and seeding as [`StratifiedDownsampler`].
pub fn downsample_to_count(
    matrices: &mut [SparseContactMatrix],
    count: f64,
    seed: u64,
) -> Result<()> {
    if count.is_nan() || count < 0.0 {
        return Err(Error::InvalidArgument {
            arg: "count",
            reason: format!("{} is not a non-negative count", count),
        });
    }

    matrices
        .par_iter_mut()
        .enumerate()
        .try_for_each(|(idx, m)| {
            let total = m.sum();
            if total <= count {
                return Ok(());
            }
            let rate = count / total;
            let mut rng = matrix_rng(seed, idx);
            thin(m, |_, _| rate, &mut rng)
        })
}
