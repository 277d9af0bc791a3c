#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/saigon/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod aggregate;
pub mod cafef;
pub mod error;
pub mod frame;
pub mod normalize;
pub mod records;
pub mod store;

pub use aggregate::{
    AggregateConfig, Aggregator, FailurePolicy, HistorySource, InstrumentOutcome,
    InstrumentReport, RawCollection,
};
pub use error::{DataError, Result};
pub use normalize::{Grouping, NormalizeReport, Normalized, normalize_prices, normalize_risk_free};
pub use records::{PriceRecord, RiskFreeRecord};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
