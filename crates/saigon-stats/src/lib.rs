#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/saigon/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod arima;
pub mod correlation;
pub mod criterion;
pub mod descriptive;
pub mod error;
pub mod matrix;
pub mod ols;
pub mod stationarity;

// Re-export main types
pub use arima::{ArimaFit, ArimaOrder, AutoArima, AutoArimaConfig, Forecast, auto_arima};
pub use criterion::InformationCriterion;
pub use descriptive::{Summary, describe};
pub use error::{Result, StatsError};
pub use ols::{OlsFit, ols};
pub use stationarity::{AdfConfig, AdfResult, CriticalValues, adf_test};
