//! Augmented Dickey-Fuller unit-root test (constant, no trend).
//!
//! The lag order is chosen by information criterion on a common sample, the
//! regression is then re-run on the longest sample for that lag. P-values
//! and critical values follow MacKinnon's response-surface approximations
//! (1994 for p-values, 2010 for critical values).

use crate::criterion::InformationCriterion;
use crate::error::{Result, StatsError};
use crate::ols::{OlsFit, ols};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

// MacKinnon (1994) coefficients, constant-only regression, one variable.
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

// MacKinnon (2010) critical value surfaces: b0 + b1/T + b2/T² + b3/T³.
const CRIT_1: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
const CRIT_5: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.040];
const CRIT_10: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];

/// Test settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdfConfig {
    /// Largest lag considered; defaults to `ceil(12 · (n/100)^(1/4))`.
    pub max_lag: Option<usize>,
    /// Lag selection criterion; `None` uses `max_lag` directly.
    pub autolag: Option<InformationCriterion>,
}

impl Default for AdfConfig {
    fn default() -> Self {
        Self {
            max_lag: None,
            autolag: Some(InformationCriterion::Aic),
        }
    }
}

/// Critical values of the test statistic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    /// 1% level
    pub one_pct: f64,
    /// 5% level
    pub five_pct: f64,
    /// 10% level
    pub ten_pct: f64,
}

/// Outcome of an ADF test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdfResult {
    /// t-statistic of the lagged level coefficient
    pub statistic: f64,
    /// MacKinnon approximate p-value
    pub p_value: f64,
    /// Number of lagged differences in the final regression
    pub used_lag: usize,
    /// Observations in the final regression
    pub nobs: usize,
    /// Critical values for `nobs`
    pub critical_values: CriticalValues,
    /// Best criterion value found during lag selection
    pub ic_best: Option<f64>,
}

impl AdfResult {
    /// Whether the unit-root null is rejected at level `alpha`.
    pub fn is_stationary(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Default maximum lag: `ceil(12 · (n/100)^(1/4))`.
pub fn default_max_lag(nobs: usize) -> usize {
    (12.0 * (nobs as f64 / 100.0).powf(0.25)).ceil() as usize
}

fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Approximate p-value of an ADF statistic (constant-only regression).
pub fn mackinnon_p_value(statistic: f64) -> Result<f64> {
    if statistic > TAU_MAX {
        return Ok(1.0);
    }
    if statistic < TAU_MIN {
        return Ok(0.0);
    }
    let z = if statistic <= TAU_STAR {
        polyval(&TAU_SMALL_P, statistic)
    } else {
        polyval(&TAU_LARGE_P, statistic)
    };
    let normal = Normal::new(0.0, 1.0).map_err(|e| StatsError::Distribution(e.to_string()))?;
    Ok(normal.cdf(z))
}

/// Critical values for a regression with `nobs` observations.
pub fn mackinnon_critical_values(nobs: usize) -> CriticalValues {
    let inv = 1.0 / nobs as f64;
    CriticalValues {
        one_pct: polyval(&CRIT_1, inv),
        five_pct: polyval(&CRIT_5, inv),
        ten_pct: polyval(&CRIT_10, inv),
    }
}

/// Regress `Δx_t` on `[x_{t-1}, Δx_{t-1}, …, Δx_{t-lags}, 1]` for rows
/// `start..` of the differenced series.
fn adf_regression(x: &[f64], diff: &[f64], start: usize, lags: usize) -> Result<OlsFit> {
    let rows = diff.len() - start;
    let cols = lags + 2;
    let mut design = Array2::<f64>::zeros((rows, cols));
    let mut y = Array1::<f64>::zeros(rows);

    for (r, t) in (start..diff.len()).enumerate() {
        y[r] = diff[t];
        design[[r, 0]] = x[t];
        for lag in 1..=lags {
            design[[r, lag]] = diff[t - lag];
        }
        design[[r, cols - 1]] = 1.0;
    }

    ols(&y, &design, true)
}

/// Run the augmented Dickey-Fuller test with a constant.
///
/// # Errors
/// `InvalidParameter` for non-finite input, `InsufficientData` when the
/// series is too short for a single lag.
pub fn adf_test(series: &[f64], config: &AdfConfig) -> Result<AdfResult> {
    if series.iter().any(|v| !v.is_finite()) {
        return Err(StatsError::InvalidParameter(
            "ADF input contains missing values".to_string(),
        ));
    }

    let n = series.len();
    if n < 6 {
        return Err(StatsError::InsufficientData {
            required: 6,
            actual: n,
        });
    }

    let max_lag = config
        .max_lag
        .unwrap_or_else(|| default_max_lag(n))
        .min(n / 2 - 2);

    let diff: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    let (used_lag, ic_best) = match config.autolag {
        Some(criterion) => {
            let mut best: Option<(f64, usize)> = None;
            for lags in 0..=max_lag {
                let fit = adf_regression(series, &diff, max_lag, lags)?;
                let ic = criterion.of_ols(&fit);
                if best.is_none_or(|(value, _)| ic < value) {
                    best = Some((ic, lags));
                }
            }
            match best {
                Some((ic, lags)) => (lags, Some(ic)),
                None => (max_lag, None),
            }
        }
        None => (max_lag, None),
    };

    let fit = adf_regression(series, &diff, used_lag, used_lag)?;
    let statistic = fit.t_values[0];
    let nobs = fit.nobs;

    debug!(statistic, used_lag, nobs, "adf regression");

    Ok(AdfResult {
        statistic,
        p_value: mackinnon_p_value(statistic)?,
        used_lag,
        nobs,
        critical_values: mackinnon_critical_values(nobs),
        ic_best,
    })
}
