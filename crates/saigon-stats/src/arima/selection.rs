//! Automatic ARIMA order selection.

use super::ArimaOrder;
use super::model::{ArimaFit, difference, fit_arima};
use crate::criterion::InformationCriterion;
use crate::error::{Result, StatsError};
use crate::stationarity::{AdfConfig, adf_test};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Search space and ranking rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoArimaConfig {
    /// Largest AR order tried
    pub max_p: usize,
    /// Largest differencing order
    pub max_d: usize,
    /// Largest MA order tried
    pub max_q: usize,
    /// Ranking criterion
    pub criterion: InformationCriterion,
    /// Estimate a mean when the series is not differenced
    pub with_mean: bool,
    /// Level of the ADF tests deciding the differencing order
    pub alpha: f64,
}

impl Default for AutoArimaConfig {
    fn default() -> Self {
        Self {
            max_p: 5,
            max_d: 2,
            max_q: 5,
            criterion: InformationCriterion::Aic,
            with_mean: true,
            alpha: 0.05,
        }
    }
}

/// Score of one candidate order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidateScore {
    /// Order tried
    pub order: ArimaOrder,
    /// Akaike information criterion
    pub aic: f64,
    /// Bayesian information criterion
    pub bic: f64,
}

/// Selected model and the scores of every candidate that could be fitted.
#[derive(Debug, Clone)]
pub struct AutoArima {
    /// Best model by the configured criterion
    pub best: ArimaFit,
    /// Candidates in search order
    pub candidates: Vec<CandidateScore>,
}

/// Number of differences needed before ADF rejects a unit root at `alpha`,
/// capped at `max_d`.
pub fn ndiffs(series: &[f64], alpha: f64, max_d: usize) -> Result<usize> {
    let config = AdfConfig::default();
    let mut d = 0;
    let mut current = series.to_vec();
    while d < max_d {
        let test = adf_test(&current, &config)?;
        debug!(d, p_value = test.p_value, "differencing test");
        if test.is_stationary(alpha) {
            break;
        }
        current = difference(&current, 1);
        d += 1;
    }
    Ok(d)
}

/// Choose `d` by repeated ADF tests, then fit every `(p, q)` on the grid and
/// keep the model with the lowest criterion.
///
/// Candidates that fail to estimate are skipped.
///
/// # Errors
/// `NoModel` when no candidate could be fitted.
pub fn auto_arima(series: &[f64], config: &AutoArimaConfig) -> Result<AutoArima> {
    let d = ndiffs(series, config.alpha, config.max_d)?;

    let mut best: Option<ArimaFit> = None;
    let mut candidates = Vec::new();

    for p in 0..=config.max_p {
        for q in 0..=config.max_q {
            let order = ArimaOrder::new(p, d, q);
            let fit = match fit_arima(series, order, config.with_mean) {
                Ok(fit) => fit,
                Err(e) => {
                    debug!(%order, error = %e, "candidate skipped");
                    continue;
                }
            };
            debug!(%order, aic = fit.aic, bic = fit.bic, "candidate fitted");
            candidates.push(CandidateScore {
                order,
                aic: fit.aic,
                bic: fit.bic,
            });

            let better = best.as_ref().is_none_or(|current| {
                fit.criterion(config.criterion) < current.criterion(config.criterion)
            });
            if better {
                best = Some(fit);
            }
        }
    }

    let best = best.ok_or_else(|| {
        StatsError::NoModel(format!("no ARIMA(p, {d}, q) candidate could be estimated"))
    })?;

    info!(
        order = %best.order,
        criterion = %config.criterion,
        value = best.criterion(config.criterion),
        candidates = candidates.len(),
        "ARIMA order selected"
    );

    Ok(AutoArima { best, candidates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen_range(-0.02..0.02)).collect()
    }

    #[test]
    fn test_ndiffs() {
        let e = noise(400, 2);
        assert_eq!(ndiffs(&e, 0.05, 2).unwrap(), 0);

        let walk: Vec<f64> = e
            .iter()
            .scan(100.0, |level, step| {
                *level += step;
                Some(*level)
            })
            .collect();
        assert_eq!(ndiffs(&walk, 0.05, 2).unwrap(), 1);
        assert_eq!(ndiffs(&walk, 0.05, 0).unwrap(), 0);
    }

    #[test]
    fn test_auto_arima_on_white_noise() {
        let config = AutoArimaConfig {
            max_p: 2,
            max_q: 2,
            ..AutoArimaConfig::default()
        };
        let result = auto_arima(&noise(300, 4), &config).unwrap();
        assert_eq!(result.candidates.len(), 9);
        assert_eq!(result.best.order.d, 0);

        let best_aic = result
            .candidates
            .iter()
            .map(|c| c.aic)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(result.best.aic, best_aic);
    }

    #[test]
    fn test_bic_penalizes_more() {
        let config = AutoArimaConfig {
            max_p: 3,
            max_q: 0,
            criterion: InformationCriterion::Bic,
            ..AutoArimaConfig::default()
        };
        let result = auto_arima(&noise(500, 8), &config).unwrap();
        assert!(result.best.order.p <= 1);
    }
}
