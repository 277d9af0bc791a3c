#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/saigon/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod charts;
pub mod export;
pub mod summary;

pub use charts::{Band, LineChart, LineSeries, PALETTE, coolwarm, correlation_heatmap, write_svg};
pub use export::{
    AdfRow, CandidateRow, CapmRow, CoverageRow, ExportError, ExportFormat, Exporter, ForecastRow,
    MissingValueRow, OutlierRow, PortfolioMetricsRow, SummaryRow, write_file,
};
pub use summary::{Align, TextTable, capm_table, portfolio_table};
