//! Configuration for a preprocessing run
//!
//! Every field has a default, so a JSON document only needs the settings
//! it changes:
//!
//! ```
//! use hicnorm::PreprocessConfig;
//!
//! let config = PreprocessConfig::from_json(
//!     r#"{"resolution": 100000, "normalizers": [{"method": "SQVC"}]}"#,
//! )
//! .unwrap();
//! assert_eq!(config.resolution, 100_000);
//! assert_eq!(config.downsample.seed, 0);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::error::Category;

use crate::accumulator::BulkAggregator;
use crate::batch::BatchConfig;
use crate::constants::{
    BIN_SCALE_EPSILON, CLIP_INDICATOR_EPSILON, CLIP_VARIANCE_TOLERANCE, COVERAGE_EPSILON,
    DEFAULT_AGGREGATION_CHUNK, DEFAULT_RESOLUTION, MAX_ENCODED_NNZ,
};
use crate::downsample::DownsampleConfig;
use crate::error::{Error, Result};
use crate::normalize::{Normalizer, NormalizerSpec, PerCellStep};
use crate::window::WindowConfig;

/// Divide-by-zero guards and tolerances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Epsilons {
    /// Added to per-bin coverage before inversion
    pub bin_scale: f64,
    /// Added to a matrix total before per-cell coverage normalization
    pub coverage: f64,
    /// Added to the clip observation-indicator bulk
    pub clip_indicator: f64,
    /// Largest negative variance tolerated while fitting clip thresholds
    pub clip_variance_tolerance: f64,
}

impl Default for Epsilons {
    fn default() -> Self {
        Self {
            bin_scale: BIN_SCALE_EPSILON,
            coverage: COVERAGE_EPSILON,
            clip_indicator: CLIP_INDICATOR_EPSILON,
            clip_variance_tolerance: CLIP_VARIANCE_TOLERANCE,
        }
    }
}

/// Settings for every preprocessing component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Base pairs per bin
    pub resolution: u64,

    /// Normalizers, fitted and applied in this order
    pub normalizers: Vec<NormalizerSpec>,

    /// Per-cell steps run after the normalizers
    pub per_cell: Vec<PerCellStep>,

    pub downsample: DownsampleConfig,
    pub window: WindowConfig,
    pub batch: BatchConfig,
    pub epsilon: Epsilons,

    /// Largest total number of stored entries accepted
    pub max_nnz: usize,

    /// Output rows filled by one aggregation task
    pub chunk_size: usize,

    /// Worker threads; all cores when unset
    pub n_threads: Option<usize>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            normalizers: Vec::new(),
            per_cell: Vec::new(),
            downsample: DownsampleConfig::default(),
            window: WindowConfig::default(),
            batch: BatchConfig::default(),
            epsilon: Epsilons::default(),
            max_nnz: MAX_ENCODED_NNZ,
            chunk_size: DEFAULT_AGGREGATION_CHUNK,
            n_threads: None,
        }
    }
}

impl PreprocessConfig {
    /// Parses a JSON document; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedMethod`] for an unknown normalizer, step, mode,
    ///   axis or layout name
    /// - [`Error::Config`] for any other malformed document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| match unknown_variant(&err) {
            Some(name) => Error::unsupported("configuration value", name),
            None => Error::Config(err),
        })
    }

    /// Aggregator honoring `max_nnz` and `chunk_size`
    pub fn aggregator(&self) -> BulkAggregator {
        BulkAggregator::new(self.max_nnz, self.chunk_size)
    }

    /// Instantiates the configured normalizers with the configured guards
    pub fn build_normalizers(&self) -> Vec<Box<dyn Normalizer>> {
        self.normalizers
            .iter()
            .map(|spec| spec.build(&self.epsilon))
            .collect()
    }
}

/// Name carried by a serde "unknown variant" error
fn unknown_variant(err: &serde_json::Error) -> Option<String> {
    if err.classify() != Category::Data {
        return None;
    }
    let message = err.to_string();
    let rest = message.strip_prefix("unknown variant `")?;
    rest.split('`').next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downsample::DownsampleMode;
    use crate::matrix::SparseContactMatrix;
    use crate::normalize::{ClipAxis, FitContext, NormalizerState};
    use crate::window::WindowLayout;

    #[test]
    fn test_default_round_trip() {
        let config = PreprocessConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(PreprocessConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_partial_document() {
        let config = PreprocessConfig::from_json(
            r#"{
                "normalizers": [{"method": "VC"}, {"method": "clip", "axis": "row"}],
                "per_cell": [{"step": "log1p"}],
                "downsample": {"mode": "global", "seed": 42},
                "window": {"off_diag": 8, "layout": "sparse"},
                "epsilon": {"coverage": 0.5},
                "n_threads": 2
            }"#,
        )
        .unwrap();

        assert_eq!(config.resolution, DEFAULT_RESOLUTION);
        assert_eq!(
            config.normalizers[1],
            NormalizerSpec::Clip {
                axis: ClipAxis::Row,
                s: 10.0
            }
        );
        assert_eq!(config.downsample.mode, DownsampleMode::Global);
        assert_eq!(config.downsample.seed, 42);
        assert_eq!(config.window.layout, WindowLayout::Sparse);
        assert_eq!(config.epsilon.coverage, 0.5);
        assert_eq!(config.epsilon.bin_scale, BIN_SCALE_EPSILON);
        assert_eq!(config.build_normalizers().len(), 2);
    }

    #[test]
    fn test_unknown_method_is_unsupported() {
        let err = PreprocessConfig::from_json(r#"{"normalizers": [{"method": "KR"}]}"#);
        assert!(matches!(
            err,
            Err(Error::UnsupportedMethod { ref name, .. }) if name == "KR"
        ));

        let err = PreprocessConfig::from_json(r#"{"window": {"layout": "csr"}}"#);
        assert!(matches!(
            err,
            Err(Error::UnsupportedMethod { ref name, .. }) if name == "csr"
        ));
    }

    #[test]
    fn test_malformed_document_is_config_error() {
        assert!(matches!(
            PreprocessConfig::from_json(r#"{"resolution": "fine"}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            PreprocessConfig::from_json("{"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_normalizers_use_configured_epsilon() {
        let config = PreprocessConfig::from_json(
            r#"{"normalizers": [{"method": "VC"}], "epsilon": {"bin_scale": 1.0}}"#,
        )
        .unwrap();
        let matrices = vec![SparseContactMatrix::zeros(2)];
        let aggregator = config.aggregator();
        let bulk = aggregator.aggregate(&matrices).unwrap();
        let ctx = FitContext {
            matrices: &matrices,
            aggregator: &aggregator,
        };

        // coverage 0 plus a guard of 1 gives unit factors
        let state = config.build_normalizers()[0].fit(&bulk, &ctx).unwrap();
        assert_eq!(
            state,
            NormalizerState::BinScale {
                factors: ndarray::array![1.0, 1.0]
            }
        );
    }
}
