//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur during data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(String),

    /// The vendor response did not have the expected shape
    #[error("Unexpected response for {symbol}: {reason}")]
    Envelope {
        /// Symbol that was queried
        symbol: String,
        /// What was wrong with the payload
        reason: String,
    },

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Invalid date range
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date of the range
        start: String,
        /// End date of the range
        end: String,
    },

    /// Missing data
    #[error("Missing data for {symbol}: {reason}")]
    MissingData {
        /// Symbol that was queried
        symbol: String,
        /// Reason for missing data
        reason: String,
    },

    /// A table lacks a column the operation needs
    #[error("Missing column '{column}' in {table}")]
    MissingColumn {
        /// Table description (usually a file path)
        table: String,
        /// Column name that was expected
        column: String,
    },

    /// An input file does not exist
    #[error("File not found: {path}")]
    NotFound {
        /// Path that was looked up
        path: String,
    },

    /// Invalid symbol
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Too many instruments failed to fetch
    #[error("{failed} of {total} instruments failed to fetch (limit {limit:.0}%)")]
    TooManyFailures {
        /// Instruments that ended without data
        failed: usize,
        /// Instruments attempted
        total: usize,
        /// Allowed failure share, in percent
        limit: f64,
    },

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    /// Whether the error concerns a single instrument and may be recovered from
    /// a backup table.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Http(_)
                | Self::Envelope { .. }
                | Self::MissingData { .. }
                | Self::Parse(_)
        )
    }
}
