#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/saigon/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod pipeline;
pub mod universe;

// Re-export main types from sub-crates
pub use saigon_data as data;
pub use saigon_factors as factors;
pub use saigon_output as output;
pub use saigon_stats as stats;

pub use config::{AnalysisConfig, ConfigError, FetchConfig, ForecastConfig, PathsConfig, SaigonConfig};
pub use pipeline::{
    AcquisitionSummary, Analysis, PipelineError, Stage, acquire, analyze, write_reports,
};
pub use universe::{BENCHMARK, Sector, Universe, Vn30Universe};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
