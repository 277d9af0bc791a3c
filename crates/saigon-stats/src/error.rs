//! Error types for statistical routines.

use thiserror::Error;

/// Result type for statistical routines.
pub type Result<T> = std::result::Result<T, StatsError>;

/// Errors that can occur during estimation.
#[derive(Debug, Error)]
pub enum StatsError {
    /// Insufficient data for estimation
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// Matrix cannot be inverted
    #[error("Singular matrix: {0}")]
    Singular(String),

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

    /// A probability distribution could not be built
    #[error("Distribution error: {0}")]
    Distribution(String),

    /// No candidate model could be estimated
    #[error("No model could be fitted: {0}")]
    NoModel(String),
}
