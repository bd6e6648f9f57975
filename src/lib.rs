//! # hicnorm: preprocessing for single-cell chromatin contact matrices
//!
//! hicnorm aggregates, normalizes and resamples collections of sparse,
//! symmetric contact matrices, one per cell, before they are fed to a
//! downstream model.
//!
//! ## Overview
//!
//! - **Aggregation**: the dense element-wise mean ("bulk") of a collection,
//!   computed in parallel with a deterministic reduction order.
//! - **Normalization**: fit/transform normalizers (`SQVC`, `VC`, `OE`, clip)
//!   fitted on the bulk and replayed on every cell, followed by optional
//!   per-cell steps (coverage, diagonal handling, log1p, smoothing).
//! - **Downsampling**: per-distance binomial thinning that equalises depth
//!   across groups of cells.
//! - **Windowing**: re-indexing into a band around the diagonal, dense or
//!   sparse, with bin filtering and batch-effect correction.
//!
//! ## Usage
//!
//! ```
//! use hicnorm::{Preprocessor, SparseContactMatrix};
//!
//! let cell = SparseContactMatrix::from_upper_triangle(
//!     3,
//!     vec![0, 0, 1, 2],
//!     vec![0, 1, 2, 2],
//!     vec![4.0, 2.0, 1.0, 3.0],
//! )
//! .unwrap();
//! let mut cells = vec![cell.clone(), cell];
//!
//! let pre = Preprocessor::from_json(r#"{"normalizers": [{"method": "VC"}]}"#).unwrap();
//! let outcome = pre.normalize(&mut cells, None).unwrap();
//! assert_eq!(outcome.states.len(), 1);
//! ```

pub mod accumulator;
pub mod batch;
pub mod config;
pub mod constants;
pub mod downsample;
pub mod error;
pub mod expected;
pub mod filter;
pub mod matrix;
pub mod normalize;
pub mod parallel;
pub mod preprocess;
pub mod utils;
pub mod window;

pub use accumulator::{Accumulator, BulkAggregator, DenseAccumulator, SortAccumulator};
pub use batch::{
    quantile_normalize, regress_out, BatchConfig, BatchCorrection, BatchCorrector,
    ReferenceAverage,
};
pub use config::{Epsilons, PreprocessConfig};
pub use downsample::{
    downsample_to_count, stratum_totals, DownsampleConfig, DownsampleMode, DownsampleReport,
    RateMode, StratifiedDownsampler,
};
pub use error::{Error, Result};
pub use expected::{get_expected, kth_diag_indices, oe};
pub use filter::{filter_bins, filter_bins_from_matrices, BinFilter};
pub use matrix::{
    check_partition, partition_from_labels, total_nnz, MergedTriples, SparseContactMatrix,
};
pub use normalize::per_cell::{
    half_main_diag, log1p_matrix, normalize_by_coverage, smooth, zero_main_diag,
};
pub use normalize::{
    Clip, ClipAxis, ClipThreshold, CoverageMethod, CoverageScale, FitContext,
    NormalizationOutcome, Normalizer, NormalizerSpec, NormalizerState, ObservedExpected,
    PerCellNormalizer, PerCellStep,
};
pub use parallel::run_in_pool;
pub use preprocess::Preprocessor;
pub use window::{
    patch_factor, reformat, slice_rearrange, WindowConfig, WindowLayout, WindowShape,
    WindowedBatch, WindowedData,
};
