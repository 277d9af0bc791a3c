//! Beta-sorted, equal-weighted portfolios and their performance.

use crate::capm::CapmResult;
use crate::error::{FactorError, Result};
use crate::panel::Panel;
use crate::returns::ReturnSeries;
use chrono::NaiveDate;
use saigon_stats::descriptive::{mean, std_dev};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Name of the high-beta portfolio.
pub const AGGRESSIVE: &str = "Aggressive (High β)";

/// Name of the low-beta portfolio.
pub const STABLE: &str = "Stable (Low β)";

/// Named, equal-weighted group of tickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Display name
    pub name: String,
    /// Members, in the order they were selected
    pub tickers: Vec<String>,
}

impl Portfolio {
    /// Number of members.
    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    /// Whether the portfolio has no members.
    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Weight of each member (1/N).
    pub fn weight(&self) -> f64 {
        if self.tickers.is_empty() {
            0.0
        } else {
            1.0 / self.tickers.len() as f64
        }
    }
}

/// Split of the estimated instruments by a beta threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct BetaPartition {
    /// Threshold separating the groups
    pub threshold: f64,
    /// Tickers with `beta > threshold`
    pub aggressive: Vec<String>,
    /// Tickers with `beta <= threshold`
    pub stable: Vec<String>,
}

impl BetaPartition {
    /// Partition CAPM results. Instruments with a non-finite beta are
    /// left out of both groups.
    pub fn from_results(results: &[CapmResult], threshold: f64) -> Self {
        let mut aggressive = Vec::new();
        let mut stable = Vec::new();
        for result in results {
            if !result.beta.is_finite() {
                warn!(ticker = %result.ticker, "non-finite beta, left out of portfolios");
            } else if result.beta > threshold {
                aggressive.push(result.ticker.clone());
            } else {
                stable.push(result.ticker.clone());
            }
        }
        Self {
            threshold,
            aggressive,
            stable,
        }
    }

    /// The non-empty portfolios, high beta first.
    pub fn portfolios(&self) -> Vec<Portfolio> {
        [(AGGRESSIVE, &self.aggressive), (STABLE, &self.stable)]
            .into_iter()
            .filter(|(_, tickers)| !tickers.is_empty())
            .map(|(name, tickers)| Portfolio {
                name: name.to_string(),
                tickers: tickers.clone(),
            })
            .collect()
    }
}

/// Treatment of a period where some members have no return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingMemberPolicy {
    /// Average over the members present in the period
    #[default]
    RenormalizePresent,
    /// Skip the period entirely
    DropPeriod,
}

/// Riskless rate subtracted in the Sharpe ratio numerator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharpeConvention {
    /// Annualized return minus the mean per-period rate
    #[default]
    MonthlyRiskFree,
    /// Annualized return minus the compounded annual rate
    AnnualizedRiskFree,
}

/// Configuration for portfolio construction and evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    /// Beta separating aggressive from stable (default: 1.0)
    pub beta_threshold: f64,
    /// Missing member handling
    pub missing: MissingMemberPolicy,
    /// Sharpe ratio convention
    pub sharpe: SharpeConvention,
    /// Return periods per year (default: 12)
    pub periods_per_year: f64,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            beta_threshold: 1.0,
            missing: MissingMemberPolicy::default(),
            sharpe: SharpeConvention::default(),
            periods_per_year: 12.0,
        }
    }
}

/// Summary statistics of a return series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Mean return times periods per year
    pub annualized_return: f64,
    /// Sample standard deviation times √(periods per year)
    pub volatility: f64,
    /// Excess annualized return per unit of volatility
    pub sharpe_ratio: f64,
    /// Compounded return over the whole sample
    pub total_return: f64,
    /// Worst peak-to-trough loss of the compounded curve
    pub max_drawdown: f64,
    /// Number of periods
    pub periods: usize,
}

impl PerformanceMetrics {
    /// Evaluate `returns` against the mean per-period riskless rate.
    pub fn compute(returns: &[f64], mean_risk_free: f64, config: &PortfolioConfig) -> Result<Self> {
        if returns.len() < 2 {
            return Err(FactorError::InsufficientData {
                required: 2,
                actual: returns.len(),
            });
        }
        let ppy = config.periods_per_year;
        let annualized_return = mean(returns) * ppy;
        let volatility = std_dev(returns) * ppy.sqrt();
        let hurdle = match config.sharpe {
            SharpeConvention::MonthlyRiskFree => mean_risk_free,
            SharpeConvention::AnnualizedRiskFree => (1.0 + mean_risk_free).powf(ppy) - 1.0,
        };
        let sharpe_ratio = if volatility > 0.0 {
            (annualized_return - hurdle) / volatility
        } else {
            f64::NAN
        };
        let cumulative = cumulative_returns(returns);

        Ok(Self {
            annualized_return,
            volatility,
            sharpe_ratio,
            total_return: cumulative.last().map_or(0.0, |c| c - 1.0),
            max_drawdown: max_drawdown(&cumulative),
            periods: returns.len(),
        })
    }
}

/// Compounded growth of one unit: `Π(1 + r)`.
pub fn cumulative_returns(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |acc, r| {
            *acc *= 1.0 + r;
            Some(*acc)
        })
        .collect()
}

/// Minimum of `(c − running_max) / running_max` over a compounded curve.
/// Zero for an empty or never-decreasing curve.
pub fn max_drawdown(cumulative: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;
    for &value in cumulative {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.min((value - peak) / peak);
        }
    }
    worst
}

/// Equal-weighted return of `portfolio` for every period of `returns`.
pub fn portfolio_returns(
    returns: &Panel,
    portfolio: &Portfolio,
    policy: MissingMemberPolicy,
) -> Result<ReturnSeries> {
    let members = returns.select(&portfolio.tickers)?;
    let mut dates: Vec<NaiveDate> = Vec::new();
    let mut values: Vec<f64> = Vec::new();

    for (date, row) in members.dates().iter().zip(members.values().rows()) {
        let present: Vec<f64> = row.iter().copied().filter(|v| v.is_finite()).collect();
        let keep = match policy {
            MissingMemberPolicy::RenormalizePresent => !present.is_empty(),
            MissingMemberPolicy::DropPeriod => present.len() == row.len(),
        };
        if keep {
            dates.push(*date);
            values.push(present.iter().sum::<f64>() / present.len() as f64);
        }
    }
    Ok(ReturnSeries { dates, values })
}

/// Returns, compounded curve and metrics of one portfolio.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioPerformance {
    /// The evaluated portfolio
    pub portfolio: Portfolio,
    /// Period returns
    pub returns: ReturnSeries,
    /// Compounded curve aligned with `returns.dates`
    pub cumulative: Vec<f64>,
    /// Summary statistics
    pub metrics: PerformanceMetrics,
}

/// Builds the beta-sorted portfolios and evaluates them.
#[derive(Debug, Default)]
pub struct PortfolioBacktest {
    config: PortfolioConfig,
}

impl PortfolioBacktest {
    /// Create a backtest with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backtest with custom settings.
    pub const fn with_config(config: PortfolioConfig) -> Self {
        Self { config }
    }

    /// Settings in use.
    pub const fn config(&self) -> &PortfolioConfig {
        &self.config
    }

    /// Partition `results`, then evaluate each non-empty portfolio on the
    /// period `returns`.
    pub fn run(
        &self,
        returns: &Panel,
        results: &[CapmResult],
        mean_risk_free: f64,
    ) -> Result<Vec<PortfolioPerformance>> {
        let partition = BetaPartition::from_results(results, self.config.beta_threshold);
        partition
            .portfolios()
            .into_iter()
            .map(|portfolio| self.evaluate(returns, portfolio, mean_risk_free))
            .collect()
    }

    /// Evaluate one portfolio.
    pub fn evaluate(
        &self,
        returns: &Panel,
        portfolio: Portfolio,
        mean_risk_free: f64,
    ) -> Result<PortfolioPerformance> {
        let series = portfolio_returns(returns, &portfolio, self.config.missing)?;
        let metrics = PerformanceMetrics::compute(&series.values, mean_risk_free, &self.config)?;
        info!(
            portfolio = %portfolio.name,
            members = portfolio.len(),
            annualized_return = metrics.annualized_return,
            sharpe = metrics.sharpe_ratio,
            "portfolio evaluated"
        );
        Ok(PortfolioPerformance {
            cumulative: cumulative_returns(&series.values),
            returns: series,
            portfolio,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;

    fn result(ticker: &str, beta: f64) -> CapmResult {
        CapmResult {
            ticker: ticker.to_string(),
            alpha: 0.0,
            beta,
            alpha_t: 0.0,
            beta_t: 0.0,
            alpha_p: 1.0,
            beta_p: 1.0,
            r_squared: 0.0,
            adj_r_squared: 0.0,
            nobs: 10,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_partition_is_strict_bisection() {
        let mut rng = StdRng::seed_from_u64(11);
        let results: Vec<CapmResult> = (0..30)
            .map(|i| result(&format!("T{i}"), rng.gen_range(0.2..1.8)))
            .chain([result("ONE", 1.0)])
            .collect();
        let partition = BetaPartition::from_results(&results, 1.0);

        assert_eq!(partition.aggressive.len() + partition.stable.len(), results.len());
        for r in &results {
            let high = partition.aggressive.contains(&r.ticker);
            let low = partition.stable.contains(&r.ticker);
            assert!(high ^ low, "{}", r.ticker);
            assert_eq!(high, r.beta > 1.0);
        }
        assert!(partition.stable.contains(&"ONE".to_string()));
    }

    #[test]
    fn test_empty_portfolio_skipped() {
        let partition = BetaPartition::from_results(&[result("A", 0.5), result("B", 0.9)], 1.0);
        let portfolios = partition.portfolios();
        assert_eq!(portfolios.len(), 1);
        assert_eq!(portfolios[0].name, STABLE);
        assert_relative_eq!(portfolios[0].weight(), 0.5);
    }

    #[rstest]
    #[case(vec![1.0, 1.1, 1.2, 1.2], 0.0)]
    #[case(vec![1.0, 1.2, 0.9, 1.3], -0.25)]
    #[case(vec![1.0, 0.5, 0.75, 0.25], -0.75)]
    #[case(vec![], 0.0)]
    fn test_max_drawdown(#[case] curve: Vec<f64>, #[case] expected: f64) {
        assert_relative_eq!(max_drawdown(&curve), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_drawdown_sign_property() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let returns: Vec<f64> = (0..24).map(|_| rng.gen_range(-0.1..0.12)).collect();
            let curve = cumulative_returns(&returns);
            let dd = max_drawdown(&curve);
            assert!(dd <= 0.0);
            assert_eq!(dd == 0.0, curve.windows(2).all(|w| w[1] >= w[0]), "{curve:?}");
        }
    }

    #[test]
    fn test_metrics_hand_computation() {
        let returns = [0.10, 0.10, -0.10];
        let config = PortfolioConfig::default();
        let metrics = PerformanceMetrics::compute(&returns, 0.002, &config).unwrap();
        assert_relative_eq!(metrics.annualized_return, 0.4, epsilon = 1e-12);
        let sd = (((0.1f64 - 1.0 / 30.0).powi(2) * 2.0 + (-0.1f64 - 1.0 / 30.0).powi(2)) / 2.0).sqrt();
        assert_relative_eq!(metrics.volatility, sd * 12f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(metrics.sharpe_ratio, (0.4 - 0.002) / metrics.volatility, epsilon = 1e-12);
        assert_relative_eq!(metrics.total_return, 1.1 * 1.1 * 0.9 - 1.0, epsilon = 1e-12);
        assert_relative_eq!(metrics.max_drawdown, -0.1, epsilon = 1e-12);

        let annual = PortfolioConfig {
            sharpe: SharpeConvention::AnnualizedRiskFree,
            ..PortfolioConfig::default()
        };
        let metrics = PerformanceMetrics::compute(&returns, 0.002, &annual).unwrap();
        let hurdle = 1.002f64.powi(12) - 1.0;
        assert_relative_eq!(metrics.sharpe_ratio, (0.4 - hurdle) / metrics.volatility, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_member_policies() {
        let returns = Panel::new(
            vec![date(2020, 1, 31), date(2020, 2, 29), date(2020, 3, 31)],
            vec!["A".to_string(), "B".to_string()],
            array![[0.02, 0.04], [f64::NAN, 0.01], [-0.01, 0.03]],
        )
        .unwrap();
        let portfolio = Portfolio {
            name: STABLE.to_string(),
            tickers: vec!["A".to_string(), "B".to_string()],
        };

        let kept = portfolio_returns(&returns, &portfolio, MissingMemberPolicy::RenormalizePresent).unwrap();
        assert_eq!(kept.len(), 3);
        assert_relative_eq!(kept.values[1], 0.01, epsilon = 1e-15);

        let dropped = portfolio_returns(&returns, &portfolio, MissingMemberPolicy::DropPeriod).unwrap();
        assert_eq!(dropped.dates, vec![date(2020, 1, 31), date(2020, 3, 31)]);
        assert_relative_eq!(dropped.values[0], 0.03, epsilon = 1e-15);
    }

    #[test]
    fn test_backtest_runs_both_portfolios() {
        let returns = Panel::new(
            vec![date(2020, 1, 31), date(2020, 2, 29), date(2020, 3, 31)],
            vec!["HI".to_string(), "LO".to_string()],
            array![[0.05, 0.01], [-0.04, 0.00], [0.06, 0.02]],
        )
        .unwrap();
        let results = [result("HI", 1.4), result("LO", 0.6)];
        let runs = PortfolioBacktest::new().run(&returns, &results, 0.001).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].portfolio.name, AGGRESSIVE);
        assert_eq!(runs[1].portfolio.tickers, vec!["LO".to_string()]);
        assert_eq!(runs[0].cumulative.len(), 3);
        assert_relative_eq!(runs[0].cumulative[2], 1.05 * 0.96 * 1.06, epsilon = 1e-12);
    }
}
