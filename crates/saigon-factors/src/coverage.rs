//! History-coverage filter.
//!
//! Only tickers priced on or before the nominal start date take part in the
//! cross-sectional computations.

use crate::error::Result;
use crate::panel::Panel;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

/// Coverage of one ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageEntry {
    /// Ticker
    pub ticker: String,
    /// First date with a valid price, if any
    pub first_date: Option<NaiveDate>,
    /// Whether `first_date <= start`
    pub sufficient: bool,
}

/// Coverage of every ticker of a panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageReport {
    /// Nominal start date
    pub start: NaiveDate,
    /// One entry per panel column, in column order
    pub entries: Vec<CoverageEntry>,
}

impl CoverageReport {
    /// Evaluate the first valid date of every ticker against `start`.
    ///
    /// Tickers without any valid price are insufficient.
    pub fn evaluate(prices: &Panel, start: NaiveDate) -> Self {
        let entries = prices
            .first_valid_dates()
            .into_iter()
            .map(|(ticker, first_date)| CoverageEntry {
                sufficient: first_date.is_some_and(|d| d <= start),
                ticker,
                first_date,
            })
            .collect();
        Self { start, entries }
    }

    /// Tickers with sufficient history, in panel order.
    pub fn sufficient(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.sufficient)
            .map(|e| e.ticker.clone())
            .collect()
    }

    /// Tickers excluded by the filter.
    pub fn insufficient(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| !e.sufficient)
            .map(|e| e.ticker.clone())
            .collect()
    }

    /// Working panel: `prices` restricted to the sufficient tickers.
    pub fn apply(&self, prices: &Panel) -> Result<Panel> {
        let keep = self.sufficient();
        info!(
            kept = keep.len(),
            excluded = self.entries.len() - keep.len(),
            start = %self.start,
            "coverage filter applied"
        );
        prices.select(&keep)
    }
}
