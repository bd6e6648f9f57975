//! Centralized constants for hicnorm
//!
//! Defaults used throughout the crate. Configuration values fall back to these
//! when a field is not supplied.

// ============================================================================
// NUMERIC GUARDS
// ============================================================================

/// Added to per-bin coverage before inversion in the coverage-scale normalizer
pub const BIN_SCALE_EPSILON: f64 = 1e-10;

/// Added to a matrix total before per-cell coverage normalization
pub const COVERAGE_EPSILON: f64 = 1e-15;

/// Added to the observation-indicator bulk when fitting the clip normalizer
pub const CLIP_INDICATOR_EPSILON: f64 = 1e-10;

/// Largest negative variance tolerated by the clip normalizer
pub const CLIP_VARIANCE_TOLERANCE: f64 = 1e-5;

/// Tolerance used when checking that thinning rates lie in (0, 1]
pub const RATE_TOLERANCE: f64 = 1e-9;

// ============================================================================
// NORMALIZER DEFAULTS
// ============================================================================

/// Default clip strength (threshold = mean + s * std)
pub const DEFAULT_CLIP_STRENGTH: f64 = 10.0;

/// Fraction of the matrix dimension a bin marginal must exceed to be valid
pub const BIN_FILTER_FRACTION: f64 = 0.01;

// ============================================================================
// SMOOTHING
// ============================================================================

/// Standard deviation of the Gaussian smoothing kernel (in bins)
pub const SMOOTH_SIGMA: f64 = 1.0;

/// Kernel truncation in standard deviations
pub const SMOOTH_TRUNCATE: f64 = 1.0;

// ============================================================================
// WINDOWING
// ============================================================================

/// Genomic span (bp) of the default off-diagonal window radius
pub const DEFAULT_OFF_DIAG_BP: u64 = 50_000_000;

/// Genomic span (bp) of the default patch factor
pub const DEFAULT_PATCH_BP: u64 = 300_000;

/// Patch factors at or below this value collapse to 1
pub const MIN_PATCH_FACTOR: usize = 2;

/// Default resolution (bp per bin)
pub const DEFAULT_RESOLUTION: u64 = 10_000;

// ============================================================================
// AGGREGATION
// ============================================================================

/// Largest number of stored entries addressable by the `u32` coordinate encoding
pub const MAX_ENCODED_NNZ: usize = u32::MAX as usize;

/// Output rows per parallel task during bulk aggregation
pub const DEFAULT_AGGREGATION_CHUNK: usize = 64;

/// Default random seed for thinning
pub const DEFAULT_SEED: u64 = 0;
