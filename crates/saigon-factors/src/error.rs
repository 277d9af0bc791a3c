//! Error types for panel and factor computations.

use polars::prelude::PolarsError;
use saigon_data::DataError;
use saigon_stats::StatsError;
use thiserror::Error;

/// Result type for panel and factor computations.
pub type Result<T> = std::result::Result<T, FactorError>;

/// Errors that can occur while building panels or estimating factor models.
#[derive(Debug, Error)]
pub enum FactorError {
    /// Insufficient data for the computation
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// A ticker is not a column of the panel
    #[error("Unknown ticker: {0}")]
    UnknownTicker(String),

    /// A panel has no rows or no columns
    #[error("Empty panel: {0}")]
    EmptyPanel(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Statistical routine failed
    #[error(transparent)]
    Stats(#[from] StatsError),

    /// Frame conversion failed
    #[error(transparent)]
    Data(#[from] DataError),

    /// DataFrame operation failed
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}
