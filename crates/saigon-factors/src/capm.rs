//! Capital Asset Pricing Model regressions.
//!
//! For each ticker, monthly excess returns are regressed on the benchmark's
//! excess returns with an intercept:
//!
//! `r_i − r_f = α + β (r_m − r_f) + ε`
//!
//! Beta measures the sensitivity to market moves: above 1 the stock
//! amplifies the market, below 1 it dampens it.

use crate::error::{FactorError, Result};
use crate::panel::Panel;
use chrono::NaiveDate;
use ndarray::Array1;
use saigon_stats::ols::{ols, with_intercept};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{info, warn};

/// Monthly returns, benchmark returns and riskless rates on common dates.
#[derive(Debug, Clone, PartialEq)]
pub struct CapmSample {
    /// Dates present in all three inputs
    pub dates: Vec<NaiveDate>,
    /// Instrument returns on `dates`
    pub returns: Panel,
    /// Benchmark returns on `dates`
    pub market: Vec<f64>,
    /// Monthly riskless rates on `dates`
    pub risk_free: Vec<f64>,
}

impl CapmSample {
    /// Inner-join instrument returns, the benchmark column `market` of
    /// `market_returns` and the monthly riskless series on their dates.
    pub fn align(
        returns: &Panel,
        market_returns: &Panel,
        market: &str,
        risk_free: &[(NaiveDate, f64)],
    ) -> Result<Self> {
        let (market_dates, market_values) = market_returns.column_series(market)?;
        let market_by_date: HashMap<NaiveDate, f64> =
            market_dates.into_iter().zip(market_values).collect();
        let rf_by_date: HashMap<NaiveDate, f64> = risk_free
            .iter()
            .filter(|(_, r)| r.is_finite())
            .copied()
            .collect();

        let dates: Vec<NaiveDate> = returns
            .dates()
            .iter()
            .filter(|d| market_by_date.contains_key(d) && rf_by_date.contains_key(d))
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if dates.is_empty() {
            return Err(FactorError::EmptyPanel(
                "no month is shared by the returns, the benchmark and the risk-free rate"
                    .to_string(),
            ));
        }

        let market = dates.iter().map(|d| market_by_date[d]).collect();
        let risk_free = dates.iter().map(|d| rf_by_date[d]).collect();

        Ok(Self {
            returns: returns.select_dates(&dates),
            dates,
            market,
            risk_free,
        })
    }

    /// Benchmark excess returns.
    pub fn excess_market(&self) -> Vec<f64> {
        self.market
            .iter()
            .zip(&self.risk_free)
            .map(|(m, rf)| m - rf)
            .collect()
    }

    /// Excess returns of one instrument.
    pub fn excess_returns(&self, ticker: &str) -> Result<Vec<f64>> {
        Ok(self
            .returns
            .column(ticker)?
            .iter()
            .zip(&self.risk_free)
            .map(|(r, rf)| r - rf)
            .collect())
    }

    /// Average monthly riskless rate over the sample.
    pub fn mean_risk_free(&self) -> f64 {
        saigon_stats::descriptive::mean(&self.risk_free)
    }
}

/// Regression output for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapmResult {
    /// Ticker
    pub ticker: String,
    /// Intercept (monthly abnormal return)
    pub alpha: f64,
    /// Market sensitivity
    pub beta: f64,
    /// t-statistic of alpha
    pub alpha_t: f64,
    /// t-statistic of beta
    pub beta_t: f64,
    /// Two-sided p-value of alpha
    pub alpha_p: f64,
    /// Two-sided p-value of beta
    pub beta_p: f64,
    /// Coefficient of determination
    pub r_squared: f64,
    /// Adjusted R²
    pub adj_r_squared: f64,
    /// Paired observations used
    pub nobs: usize,
}

/// Configuration for the CAPM regressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapmConfig {
    /// Minimum number of paired observations (default: 3)
    pub min_observations: usize,
}

impl Default for CapmConfig {
    fn default() -> Self {
        Self {
            min_observations: 3,
        }
    }
}

/// Per-ticker market-model regressions
#[derive(Debug, Default)]
pub struct CapmEstimator {
    config: CapmConfig,
}

impl CapmEstimator {
    /// Create an estimator with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an estimator with custom settings.
    pub const fn with_config(config: CapmConfig) -> Self {
        Self { config }
    }

    /// Settings in use.
    pub const fn config(&self) -> &CapmConfig {
        &self.config
    }

    /// Regress one instrument. Pairs with a missing side are dropped.
    pub fn estimate_one(&self, sample: &CapmSample, ticker: &str) -> Result<CapmResult> {
        let excess_market = sample.excess_market();
        let excess_stock = sample.excess_returns(ticker)?;

        let (y, x): (Vec<f64>, Vec<f64>) = excess_stock
            .iter()
            .zip(&excess_market)
            .filter(|(y, x)| y.is_finite() && x.is_finite())
            .map(|(y, x)| (*y, *x))
            .unzip();

        if y.len() < self.config.min_observations {
            return Err(FactorError::InsufficientData {
                required: self.config.min_observations,
                actual: y.len(),
            });
        }

        let x = Array1::from(x);
        let fit = ols(&Array1::from(y), &with_intercept(x.view()), true)?;

        Ok(CapmResult {
            ticker: ticker.to_string(),
            alpha: fit.params[0],
            beta: fit.params[1],
            alpha_t: fit.t_values[0],
            beta_t: fit.t_values[1],
            alpha_p: fit.p_values[0],
            beta_p: fit.p_values[1],
            r_squared: fit.r_squared,
            adj_r_squared: fit.adj_r_squared,
            nobs: fit.nobs,
        })
    }

    /// Regress every instrument of the sample, in column order.
    ///
    /// Instruments that cannot be estimated (too few observations,
    /// degenerate regressors) are skipped with a warning.
    pub fn estimate(&self, sample: &CapmSample) -> Vec<CapmResult> {
        let results: Vec<CapmResult> = sample
            .returns
            .columns()
            .iter()
            .filter_map(|ticker| match self.estimate_one(sample, ticker) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!(ticker = %ticker, error = %e, "CAPM regression skipped");
                    None
                }
            })
            .collect();

        info!(
            instruments = results.len(),
            months = sample.dates.len(),
            "CAPM regressions estimated"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::month_end;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn month_ends(n: usize) -> Vec<NaiveDate> {
        (0..n)
            .map(|i| {
                let year = 2020 + (i / 12) as i32;
                let month = (i % 12) as u32 + 1;
                month_end(NaiveDate::from_ymd_opt(year, month, 1).unwrap())
            })
            .collect()
    }

    fn synthetic(n: usize, betas: &[f64], seed: u64) -> CapmSample {
        let mut rng = StdRng::seed_from_u64(seed);
        let dates = month_ends(n);
        let market: Vec<f64> = (0..n).map(|_| rng.gen_range(-0.08..0.08)).collect();
        let rf = vec![0.002; n];
        let mut values = Array2::<f64>::zeros((n, betas.len()));
        for (j, beta) in betas.iter().enumerate() {
            for t in 0..n {
                let noise = rng.gen_range(-0.004..0.004);
                values[[t, j]] = rf[t] + 0.001 + beta * (market[t] - rf[t]) + noise;
            }
        }
        let columns = (0..betas.len()).map(|j| format!("T{j}")).collect();
        let returns = Panel::new(dates.clone(), columns, values).unwrap();
        let market_panel = Panel::from_series("VNINDEX", dates.clone(), market).unwrap();
        let rf: Vec<(NaiveDate, f64)> = dates.into_iter().zip(rf).collect();
        CapmSample::align(&returns, &market_panel, "VNINDEX", &rf).unwrap()
    }

    #[test]
    fn test_beta_converges_to_true_slope() {
        let sample = synthetic(600, &[0.6, 1.0, 1.4], 17);
        let results = CapmEstimator::new().estimate(&sample);
        assert_eq!(results.len(), 3);
        for (result, beta) in results.iter().zip([0.6, 1.0, 1.4]) {
            assert_relative_eq!(result.beta, beta, epsilon = 0.02);
            assert_relative_eq!(result.alpha, 0.001, epsilon = 0.0005);
            assert!(result.beta_p < 1e-6);
            assert_eq!(result.nobs, 600);
        }
    }

    #[test]
    fn test_inner_join_of_dates() {
        let dates = month_ends(4);
        let returns =
            Panel::from_series("AAA", dates.clone(), vec![0.01, 0.02, 0.03, 0.04]).unwrap();
        let market = Panel::from_series("VNINDEX", dates[1..].to_vec(), vec![0.0, 0.1, 0.2]).unwrap();
        let rf = vec![(dates[0], 0.001), (dates[1], 0.001), (dates[2], 0.001)];
        let sample = CapmSample::align(&returns, &market, "VNINDEX", &rf).unwrap();
        assert_eq!(sample.dates, vec![dates[1], dates[2]]);
        assert_eq!(sample.returns.nrows(), 2);
        assert_relative_eq!(sample.excess_market()[1], 0.099);
    }

    #[test]
    fn test_too_few_observations_are_skipped() {
        let sample = synthetic(2, &[1.0], 3);
        let estimator = CapmEstimator::new();
        assert!(matches!(
            estimator.estimate_one(&sample, "T0"),
            Err(FactorError::InsufficientData { required: 3, actual: 2 })
        ));
        assert!(estimator.estimate(&sample).is_empty());
    }

    #[test]
    fn test_no_common_dates() {
        let returns = Panel::from_series("AAA", month_ends(2), vec![0.01, 0.02]).unwrap();
        let market = Panel::from_series("VNINDEX", month_ends(2), vec![0.01, 0.02]).unwrap();
        assert!(matches!(
            CapmSample::align(&returns, &market, "VNINDEX", &[]),
            Err(FactorError::EmptyPanel(_))
        ));
    }
}
