//! Return series and panels.

use crate::calendar::month_end;
use crate::error::{FactorError, Result};
use crate::panel::Panel;
use chrono::NaiveDate;
use saigon_data::RiskFreeRecord;

/// Percentage change of consecutive prices: `N` prices give `N − 1` returns.
pub fn pct_change(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| {
            if w[0].is_finite() && w[1].is_finite() && w[0] != 0.0 {
                w[1] / w[0] - 1.0
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Daily returns of every column; rows with any undefined return are dropped.
pub fn daily_returns(prices: &Panel) -> Result<Panel> {
    prices.pct_change()?.drop_incomplete_rows()
}

/// Returns between month-end observations; rows with any undefined return
/// are dropped.
pub fn monthly_returns(prices: &Panel) -> Result<Panel> {
    prices
        .resample_month_end_last()?
        .pct_change()?
        .drop_incomplete_rows()
}

/// Monthly riskless rate per month-end date: the last observation of each
/// month, converted with `(1 + r)^(1/12) − 1`.
pub fn monthly_risk_free(records: &[RiskFreeRecord]) -> Vec<(NaiveDate, f64)> {
    let mut sorted: Vec<&RiskFreeRecord> = records.iter().filter(|r| r.rate.is_finite()).collect();
    sorted.sort_by_key(|r| r.date);

    let mut out: Vec<(NaiveDate, f64)> = Vec::new();
    for record in sorted {
        let label = month_end(record.date);
        let rate = record.monthly_rate();
        match out.last_mut() {
            Some((last, value)) if *last == label => *value = rate,
            _ => out.push((label, rate)),
        }
    }
    out
}

/// Dated returns of a single instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    /// Dates of the returns (the later date of each pair)
    pub dates: Vec<NaiveDate>,
    /// Returns
    pub values: Vec<f64>,
}

impl ReturnSeries {
    /// Returns of a dated price series; the first, undefined observation is
    /// removed. `dates` and `prices` must have the same length.
    pub fn from_prices(dates: &[NaiveDate], prices: &[f64]) -> Result<Self> {
        if dates.len() != prices.len() {
            return Err(FactorError::DimensionMismatch {
                expected: dates.len(),
                actual: prices.len(),
            });
        }
        Ok(Self {
            dates: dates.iter().skip(1).copied().collect(),
            values: pct_change(prices),
        })
    }

    /// Number of returns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reindex to every business day between the first and last date,
    /// carrying the latest return forward.
    pub fn reindex_business_days(&self) -> Result<Self> {
        let panel = Panel::from_series("return", self.dates.clone(), self.values.clone())?
            .reindex_business_days()?;
        Ok(Self {
            dates: panel.dates().to_vec(),
            values: panel.values().column(0).to_vec(),
        })
    }
}
