//! Acquisition and analysis pipeline.
//!
//! Acquisition talks to the vendor and leaves cleaned tables on disk. The
//! analysis stages only read those tables, so the two halves can run in
//! separate processes.
//!
//! Each analysis step is a [`Stage`]: a named, pure transformation whose
//! failures are reported as a [`PipelineError`] carrying the stage name.

pub mod acquisition;
pub mod analysis;
pub mod report;

pub use acquisition::{AcquisitionSummary, TableSummary, acquire};
pub use analysis::{
    Analysis, CapmOutcome, CapmStage, Eda, EdaStage, ForecastOutcome, ForecastStage, Inputs,
    LoadStage, PortfolioOutcome, PortfolioStage, PrepareStage, Prepared, analyze,
};
pub use report::{ReportStage, capm_rows, portfolio_rows, write_reports};

use crate::config::ConfigError;
use saigon_data::DataError;
use saigon_factors::FactorError;
use saigon_output::ExportError;
use saigon_stats::StatsError;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info};

/// Errors raised by the pipeline, tagged with the failing stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Reading, fetching or cleaning a table failed
    #[error("{stage}: {source}")]
    Data {
        /// Stage name
        stage: &'static str,
        /// Underlying error
        source: DataError,
    },

    /// A statistical routine failed
    #[error("{stage}: {source}")]
    Stats {
        /// Stage name
        stage: &'static str,
        /// Underlying error
        source: StatsError,
    },

    /// A panel or regression step failed
    #[error("{stage}: {source}")]
    Factor {
        /// Stage name
        stage: &'static str,
        /// Underlying error
        source: FactorError,
    },

    /// Writing a report failed
    #[error("{stage}: {source}")]
    Export {
        /// Stage name
        stage: &'static str,
        /// Underlying error
        source: ExportError,
    },

    /// A stage produced or received nothing to work with
    #[error("{stage}: {reason}")]
    Empty {
        /// Stage name
        stage: &'static str,
        /// What was empty
        reason: String,
    },

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Name of the stage that failed, if any.
    pub const fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Data { stage, .. }
            | Self::Stats { stage, .. }
            | Self::Factor { stage, .. }
            | Self::Export { stage, .. }
            | Self::Empty { stage, .. } => Some(*stage),
            Self::Config(_) => None,
        }
    }

    pub(crate) fn empty(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::Empty {
            stage,
            reason: reason.into(),
        }
    }
}

/// Conversion of a crate error into a [`PipelineError`] for a given stage.
pub trait IntoStageError {
    /// Attach the stage name.
    fn at_stage(self, stage: &'static str) -> PipelineError;
}

impl IntoStageError for DataError {
    fn at_stage(self, stage: &'static str) -> PipelineError {
        PipelineError::Data { stage, source: self }
    }
}

impl IntoStageError for StatsError {
    fn at_stage(self, stage: &'static str) -> PipelineError {
        PipelineError::Stats { stage, source: self }
    }
}

impl IntoStageError for FactorError {
    fn at_stage(self, stage: &'static str) -> PipelineError {
        PipelineError::Factor { stage, source: self }
    }
}

impl IntoStageError for ExportError {
    fn at_stage(self, stage: &'static str) -> PipelineError {
        PipelineError::Export { stage, source: self }
    }
}

/// `Result` adapter tagging errors with a stage name.
pub trait StageResultExt<T> {
    /// Map the error into a [`PipelineError`] for `stage`.
    fn stage(self, stage: &'static str) -> Result<T, PipelineError>;
}

impl<T, E: IntoStageError> StageResultExt<T> for Result<T, E> {
    fn stage(self, stage: &'static str) -> Result<T, PipelineError> {
        self.map_err(|e| e.at_stage(stage))
    }
}

/// One named step of the analysis.
pub trait Stage {
    /// Name used in logs and errors.
    const NAME: &'static str;

    /// What the stage consumes.
    type Input;

    /// What the stage produces.
    type Output;

    /// Run the stage.
    fn run(&self, input: &Self::Input) -> Result<Self::Output, PipelineError>;

    /// Run the stage, logging its duration and outcome.
    fn execute(&self, input: &Self::Input) -> Result<Self::Output, PipelineError> {
        let started = Instant::now();
        info!(stage = Self::NAME, "stage started");
        let result = self.run(input);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(stage = Self::NAME, elapsed_ms, "stage finished"),
            Err(e) => error!(stage = Self::NAME, elapsed_ms, error = %e, "stage failed"),
        }
        result
    }
}
