//! One-stop entry point driven by [`PreprocessConfig`]
//!
//! [`Preprocessor`] builds every component from a single configuration and
//! runs each operation inside a worker pool of the configured size.

use std::ops::Range;

use ndarray::Array2;

use crate::batch::{BatchCorrection, BatchCorrector};
use crate::config::PreprocessConfig;
use crate::downsample::{downsample_to_count, DownsampleReport, StratifiedDownsampler};
use crate::error::Result;
use crate::filter::{filter_bins, BinFilter};
use crate::matrix::{MergedTriples, SparseContactMatrix};
use crate::normalize::{NormalizationOutcome, PerCellNormalizer};
use crate::parallel::run_in_pool;
use crate::window::{reformat, WindowedBatch};

/// Configured preprocessing components
pub struct Preprocessor {
    config: PreprocessConfig,
    normalizer: PerCellNormalizer,
    downsampler: StratifiedDownsampler,
    corrector: BatchCorrector,
}

impl Preprocessor {
    pub fn from_config(config: PreprocessConfig) -> Self {
        let aggregator = config.aggregator();
        let normalizer = PerCellNormalizer::new(config.build_normalizers(), config.per_cell.clone())
            .with_aggregator(aggregator.clone())
            .with_coverage_epsilon(config.epsilon.coverage);
        let downsampler = StratifiedDownsampler::new(&config.downsample).with_aggregator(aggregator);
        let corrector = BatchCorrector::new(config.batch.clone());

        Self {
            config,
            normalizer,
            downsampler,
            corrector,
        }
    }

    /// Parses a JSON configuration and builds the components
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::from_config(PreprocessConfig::from_json(json)?))
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Dense bulk of `matrices`
    pub fn bulk(&self, matrices: &[SparseContactMatrix]) -> Result<Array2<f64>> {
        let aggregator = self.config.aggregator();
        run_in_pool(self.config.n_threads, || aggregator.aggregate(matrices))
    }

    /// Runs the configured normalizers and per-cell steps
    pub fn normalize(
        &self,
        matrices: &mut [SparseContactMatrix],
        intra: Option<&[SparseContactMatrix]>,
    ) -> Result<NormalizationOutcome> {
        run_in_pool(self.config.n_threads, || {
            self.normalizer.run(matrices, intra, None)
        })
    }

    /// Thins `groups` of `matrices` to a common depth
    pub fn downsample(
        &self,
        matrices: &mut [SparseContactMatrix],
        groups: &[Range<usize>],
    ) -> Result<DownsampleReport> {
        run_in_pool(self.config.n_threads, || {
            self.downsampler.downsample(matrices, groups, None)
        })
    }

    /// Thins every matrix above `count` down to about `count`
    pub fn downsample_to_count(
        &self,
        matrices: &mut [SparseContactMatrix],
        count: f64,
    ) -> Result<()> {
        let seed = self.config.downsample.seed;
        run_in_pool(self.config.n_threads, || {
            downsample_to_count(matrices, count, seed)
        })
    }

    /// Classifies bins of the collection's bulk
    pub fn filter_bins(&self, matrices: &[SparseContactMatrix]) -> Result<BinFilter> {
        let bulk = self.bulk(matrices)?;
        Ok(filter_bins(&bulk, true))
    }

    /// Reformats `matrices` into banded windows
    pub fn reformat(
        &self,
        matrices: &[SparseContactMatrix],
        valid_bins: Option<&[bool]>,
    ) -> Result<WindowedBatch> {
        reformat(
            matrices,
            self.config.resolution,
            &self.config.window,
            valid_bins,
            self.config.max_nnz,
        )
    }

    /// Applies batch correction to windowed triples
    pub fn correct_batches(
        &self,
        triples: &mut MergedTriples,
        batches: &[Range<usize>],
    ) -> Result<BatchCorrection> {
        self.corrector.correct(triples, batches)
    }
}
