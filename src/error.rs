//! Error types for hicnorm

use thiserror::Error;

/// Result type alias using hicnorm's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while aggregating, normalizing or resampling contact matrices
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown normalizer, mode or axis name
    #[error("Unsupported {kind} '{name}'")]
    UnsupportedMethod {
        /// What was being selected (normalizer, clip axis, ...)
        kind: &'static str,
        /// The unrecognised name
        name: String,
    },

    /// NaN, infinite or negative values after a transform, or a fitting defect
    #[error("Numeric integrity violation in {stage}: {reason}")]
    NumericIntegrity {
        /// Operation that detected the violation
        stage: &'static str,
        /// Description of the offending value
        reason: String,
    },

    /// Matrices in a collection disagree in shape
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: (usize, usize),
        /// Actual shape
        got: (usize, usize),
    },

    /// Parallel arrays or paired collections disagree in length
    #[error("Length mismatch for {what}: expected {expected}, got {got}")]
    LengthMismatch {
        /// The collection being compared
        what: &'static str,
        /// Expected length
        expected: usize,
        /// Actual length
        got: usize,
    },

    /// The matrix-index coordinate of a merged triple list decreases
    #[error("Batch index is not sorted: entry {position} precedes a smaller matrix index")]
    UnsortedBatchIndex {
        /// Position of the first out-of-order entry
        position: usize,
    },

    /// Group or batch ranges are not contiguous and non-overlapping
    #[error("Invalid partition: {0}")]
    InvalidPartition(String),

    /// A row's windowed neighbourhood contains no columns
    #[error("Empty window for row {row}: columns {start}..{end} of a {n_bins}-bin matrix")]
    EmptyWindow {
        /// Row whose window is empty
        row: usize,
        /// Window start column
        start: usize,
        /// Window end column (exclusive)
        end: usize,
        /// Matrix dimension
        n_bins: usize,
    },

    /// Total stored entries overflow the coordinate encoding
    #[error("Capacity exceeded: {requested} entries exceed the limit of {limit}")]
    CapacityExceeded {
        /// Number of entries requested
        requested: usize,
        /// Addressable limit
        limit: usize,
    },

    /// An operation received an empty collection
    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Why it is invalid
        reason: String,
    },

    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Shorthand for an [`Error::UnsupportedMethod`]
    pub fn unsupported(kind: &'static str, name: impl Into<String>) -> Self {
        Error::UnsupportedMethod {
            kind,
            name: name.into(),
        }
    }

    /// Shorthand for an [`Error::NumericIntegrity`]
    pub fn integrity(stage: &'static str, reason: impl Into<String>) -> Self {
        Error::NumericIntegrity {
            stage,
            reason: reason.into(),
        }
    }
}
