#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/saigon/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod calendar;
pub mod capm;
pub mod coverage;
pub mod error;
pub mod panel;
pub mod portfolio;
pub mod returns;

pub use capm::{CapmConfig, CapmEstimator, CapmResult, CapmSample};
pub use coverage::{CoverageEntry, CoverageReport};
pub use error::{FactorError, Result};
pub use panel::{Panel, PriceField};
pub use portfolio::{
    AGGRESSIVE, BetaPartition, MissingMemberPolicy, PerformanceMetrics, Portfolio,
    PortfolioBacktest, PortfolioConfig, PortfolioPerformance, STABLE, SharpeConvention,
};
pub use returns::{ReturnSeries, daily_returns, monthly_returns, monthly_risk_free};
