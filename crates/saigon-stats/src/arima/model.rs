//! ARIMA(p, d, q) estimation by conditional sum of squares.
//!
//! The differenced series `w` follows `φ(B)(w_t − μ) = θ(B)ε_t` with
//! `φ(B) = 1 − Σ φ_i Bⁱ` and `θ(B) = 1 + Σ θ_j Bʲ`. The mean `μ` is only
//! estimated when `d = 0`. AR and MA coefficients are optimized through a
//! reparameterization that keeps `φ` stationary and `θ` invertible.

use super::ArimaOrder;
use super::optimize::{NelderMeadConfig, nelder_mead};
use crate::criterion::InformationCriterion;
use crate::descriptive::{mean, std_dev};
use crate::error::{Result, StatsError};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;

/// Estimated ARIMA model.
#[derive(Debug, Clone, Serialize)]
pub struct ArimaFit {
    /// Model order
    pub order: ArimaOrder,
    /// Mean of the differenced series, when estimated
    pub mean: Option<f64>,
    /// AR coefficients `φ_1..φ_p`
    pub ar: Vec<f64>,
    /// MA coefficients `θ_1..θ_q`
    pub ma: Vec<f64>,
    /// Innovation variance
    pub sigma2: f64,
    /// Conditional Gaussian log-likelihood
    pub log_likelihood: f64,
    /// Akaike information criterion
    pub aic: f64,
    /// Bayesian information criterion
    pub bic: f64,
    /// Observations entering the likelihood
    pub nobs: usize,
    /// Whether the optimizer met its tolerances
    pub converged: bool,
    #[serde(skip)]
    history: Vec<f64>,
    #[serde(skip)]
    residuals: Vec<f64>,
}

/// Point forecasts with a symmetric confidence band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    /// Point forecasts, one per step ahead
    pub mean: Vec<f64>,
    /// Forecast standard errors
    pub std_errors: Vec<f64>,
    /// Lower band
    pub lower: Vec<f64>,
    /// Upper band
    pub upper: Vec<f64>,
    /// Significance level of the band (0.05 for 95%)
    pub alpha: f64,
}

/// `d`-th difference of a series.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut out = series.to_vec();
    for _ in 0..d {
        out = out.windows(2).map(|w| w[1] - w[0]).collect();
    }
    out
}

/// Map unconstrained values to the coefficients of a stationary AR
/// polynomial, through partial autocorrelations in (−1, 1) and the
/// Durbin-Levinson recursion.
pub(crate) fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let mut phi: Vec<f64> = Vec::with_capacity(unconstrained.len());
    for &x in unconstrained {
        let r = x / (1.0 + x * x).sqrt();
        let k = phi.len();
        let mut next = vec![0.0; k + 1];
        for i in 0..k {
            next[i] = phi[i] - r * phi[k - 1 - i];
        }
        next[k] = r;
        phi = next;
    }
    phi
}

/// Multiply two polynomials given by ascending coefficients.
fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

struct Params {
    mean: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
}

fn unpack(x: &[f64], order: ArimaOrder, with_mean: bool) -> Params {
    let offset = usize::from(with_mean);
    Params {
        mean: if with_mean { x[0] } else { 0.0 },
        ar: constrain_stationary(&x[offset..offset + order.p]),
        ma: constrain_stationary(&x[offset + order.p..])
            .into_iter()
            .map(|v| -v)
            .collect(),
    }
}

/// Innovations of the differenced series, conditional on the first `p`
/// observations and zero pre-sample innovations.
fn css_residuals(w: &[f64], params: &Params) -> Vec<f64> {
    let p = params.ar.len();
    let mut e = vec![0.0; w.len()];
    for t in p..w.len() {
        let mut value = w[t] - params.mean;
        for (i, phi) in params.ar.iter().enumerate() {
            value -= phi * (w[t - i - 1] - params.mean);
        }
        for (j, theta) in params.ma.iter().enumerate() {
            if t > j {
                value -= theta * e[t - j - 1];
            }
        }
        e[t] = value;
    }
    e
}

fn sum_of_squares(w: &[f64], params: &Params) -> f64 {
    let p = params.ar.len();
    css_residuals(w, params)[p..].iter().map(|e| e * e).sum()
}

/// Fit an ARIMA model by conditional sum of squares.
///
/// `with_mean` requests a mean term; it is ignored when `order.d > 0`.
///
/// # Errors
/// `InvalidParameter` for non-finite input, `InsufficientData` when the
/// differenced series is too short for the order.
pub fn fit_arima(series: &[f64], order: ArimaOrder, with_mean: bool) -> Result<ArimaFit> {
    if series.iter().any(|v| !v.is_finite()) {
        return Err(StatsError::InvalidParameter(
            "ARIMA input contains missing values".to_string(),
        ));
    }

    let w = difference(series, order.d);
    let with_mean = with_mean && order.d == 0;
    let n_params = usize::from(with_mean) + order.p + order.q;
    let required = order.p + n_params + 2;
    if w.len() < required {
        return Err(StatsError::InsufficientData {
            required: required + order.d,
            actual: series.len(),
        });
    }

    let mut x0 = vec![0.0; n_params];
    let mut steps = vec![0.1; n_params];
    if with_mean {
        x0[0] = mean(&w);
        let spread = std_dev(&w);
        steps[0] = if spread > 0.0 { 0.1 * spread } else { 0.1 };
    }

    let config = NelderMeadConfig {
        max_iter: 400 * n_params.max(1),
        ..NelderMeadConfig::default()
    };
    let minimum = nelder_mead(
        |x| sum_of_squares(&w, &unpack(x, order, with_mean)),
        &x0,
        &steps,
        &config,
    );

    let params = unpack(&minimum.x, order, with_mean);
    let residuals_w = css_residuals(&w, &params);
    let nobs = w.len() - order.p;
    let sse: f64 = residuals_w[order.p..].iter().map(|e| e * e).sum();
    if !sse.is_finite() || sse <= 0.0 {
        return Err(StatsError::InvalidParameter(format!(
            "degenerate sum of squares for {order}"
        )));
    }

    let sigma2 = sse / nobs as f64;
    let m = nobs as f64;
    let log_likelihood = -m / 2.0 * ((2.0 * PI * sigma2).ln() + 1.0);
    let k = n_params + 1;

    let mut residuals = vec![0.0; series.len()];
    residuals[order.d..].copy_from_slice(&residuals_w);

    Ok(ArimaFit {
        order,
        mean: with_mean.then_some(params.mean),
        ar: params.ar,
        ma: params.ma,
        sigma2,
        log_likelihood,
        aic: InformationCriterion::Aic.value(log_likelihood, k, nobs),
        bic: InformationCriterion::Bic.value(log_likelihood, k, nobs),
        nobs,
        converged: minimum.converged,
        history: series.to_vec(),
        residuals,
    })
}

impl ArimaFit {
    /// Value of `criterion` for this fit.
    pub const fn criterion(&self, criterion: InformationCriterion) -> f64 {
        match criterion {
            InformationCriterion::Aic => self.aic,
            InformationCriterion::Bic => self.bic,
        }
    }

    /// Innovations aligned with the input series (zero where undefined).
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    /// AR coefficients of the undifferenced series: `φ(B)(1 − B)^d = 1 − Σ a_i Bⁱ`.
    fn integrated_ar(&self) -> Vec<f64> {
        let mut poly: Vec<f64> = std::iter::once(1.0)
            .chain(self.ar.iter().map(|phi| -phi))
            .collect();
        for _ in 0..self.order.d {
            poly = poly_mul(&poly, &[1.0, -1.0]);
        }
        poly.iter().skip(1).map(|c| -c).collect()
    }

    /// ψ-weights of the MA(∞) representation, `ψ_0 = 1`.
    fn psi_weights(&self, ar: &[f64], count: usize) -> Vec<f64> {
        let mut psi = vec![0.0; count];
        if count == 0 {
            return psi;
        }
        psi[0] = 1.0;
        for j in 1..count {
            let mut value = self.ma.get(j - 1).copied().unwrap_or(0.0);
            for (i, a) in ar.iter().enumerate().take(j) {
                value += a * psi[j - i - 1];
            }
            psi[j] = value;
        }
        psi
    }

    /// Forecast `steps` periods past the end of the series with a
    /// `(1 − alpha)` confidence band.
    pub fn forecast(&self, steps: usize, alpha: f64) -> Result<Forecast> {
        if !(0.0..1.0).contains(&alpha) || alpha == 0.0 {
            return Err(StatsError::InvalidParameter(format!(
                "alpha must lie in (0, 1), got {alpha}"
            )));
        }

        let ar = self.integrated_ar();
        let constant = self
            .mean
            .map_or(0.0, |mu| mu * (1.0 - self.ar.iter().sum::<f64>()));

        let t0 = self.history.len();
        let mut y = self.history.clone();
        let mut e = self.residuals.clone();
        for _ in 0..steps {
            let t = y.len();
            let mut value = constant;
            for (i, a) in ar.iter().enumerate() {
                if t > i {
                    value += a * y[t - i - 1];
                }
            }
            for (j, theta) in self.ma.iter().enumerate() {
                if t > j {
                    value += theta * e[t - j - 1];
                }
            }
            y.push(value);
            e.push(0.0);
        }

        let normal = Normal::new(0.0, 1.0).map_err(|e| StatsError::Distribution(e.to_string()))?;
        let z = normal.inverse_cdf(1.0 - alpha / 2.0);

        let psi = self.psi_weights(&ar, steps);
        let mut cumulative = 0.0;
        let std_errors: Vec<f64> = psi
            .iter()
            .map(|w| {
                cumulative += w * w;
                (self.sigma2 * cumulative).sqrt()
            })
            .collect();

        let mean = y[t0..].to_vec();
        let lower = mean.iter().zip(&std_errors).map(|(m, s)| m - z * s).collect();
        let upper = mean.iter().zip(&std_errors).map(|(m, s)| m + z * s).collect();

        Ok(Forecast {
            mean,
            std_errors,
            lower,
            upper,
            alpha,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand::distributions::{Distribution, Uniform};

    fn shocks(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        // Sum of uniforms: near-Gaussian, unit variance.
        (0..n)
            .map(|_| (0..12).map(|_| rng.gen_range(0.0..1.0)).sum::<f64>() - 6.0)
            .collect()
    }

    fn ar1(phi: f64, mu: f64, n: usize, seed: u64) -> Vec<f64> {
        let e = shocks(n, seed);
        let mut y = vec![mu; n];
        for t in 1..n {
            y[t] = mu + phi * (y[t - 1] - mu) + 0.01 * e[t];
        }
        y
    }

    #[test]
    fn test_constrain_stays_stationary() {
        let uniform = Uniform::new(-5.0, 5.0);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let x: Vec<f64> = (0..2).map(|_| uniform.sample(&mut rng)).collect();
            let phi = constrain_stationary(&x);
            // AR(2) stationarity triangle
            assert!(phi[1].abs() < 1.0);
            assert!(phi[0] + phi[1] < 1.0);
            assert!(phi[1] - phi[0] < 1.0);
        }
        assert_relative_eq!(constrain_stationary(&[0.0, 0.0])[0], 0.0);
    }

    #[test]
    fn test_difference() {
        assert_eq!(difference(&[1.0, 3.0, 6.0, 10.0], 1), vec![2.0, 3.0, 4.0]);
        assert_eq!(difference(&[1.0, 3.0, 6.0, 10.0], 2), vec![1.0, 1.0]);
    }

    #[test]
    fn test_recovers_ar1() {
        let y = ar1(0.6, 0.001, 2_000, 42);
        let fit = fit_arima(&y, ArimaOrder::new(1, 0, 0), true).unwrap();
        assert_relative_eq!(fit.ar[0], 0.6, epsilon = 0.05);
        assert_relative_eq!(fit.mean.unwrap(), 0.001, epsilon = 0.002);
        assert_relative_eq!(fit.sigma2.sqrt(), 0.01, epsilon = 0.001);
        assert!(fit.aic < fit_arima(&y, ArimaOrder::new(0, 0, 0), true).unwrap().aic);
    }

    #[test]
    fn test_recovers_ma1() {
        let e = shocks(2_000, 9);
        let y: Vec<f64> = (0..e.len())
            .map(|t| e[t] + if t > 0 { 0.4 * e[t - 1] } else { 0.0 })
            .collect();
        let fit = fit_arima(&y, ArimaOrder::new(0, 0, 1), false).unwrap();
        assert_relative_eq!(fit.ma[0], 0.4, epsilon = 0.06);
    }

    #[test]
    fn test_forecast_reverts_to_mean() {
        let y = ar1(0.5, 0.002, 1_000, 7);
        let fit = fit_arima(&y, ArimaOrder::new(1, 0, 0), true).unwrap();
        let fc = fit.forecast(30, 0.05).unwrap();

        assert_eq!(fc.mean.len(), 30);
        let mu = fit.mean.unwrap();
        assert_relative_eq!(fc.mean[29], mu, epsilon = 1e-6);
        for h in 0..30 {
            assert!(fc.lower[h] < fc.mean[h] && fc.mean[h] < fc.upper[h]);
        }
        assert_relative_eq!(fc.std_errors[0], fit.sigma2.sqrt(), epsilon = 1e-12);
        assert!(fc.std_errors[29] > fc.std_errors[0]);
        assert_relative_eq!(
            fc.upper[0] - fc.mean[0],
            1.959964 * fit.sigma2.sqrt(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_random_walk_forecast_is_flat() {
        let mut level = 0.0;
        let y: Vec<f64> = shocks(300, 3)
            .into_iter()
            .map(|s| {
                level += s;
                level
            })
            .collect();
        let fit = fit_arima(&y, ArimaOrder::new(0, 1, 0), true).unwrap();
        assert!(fit.mean.is_none());
        let fc = fit.forecast(5, 0.05).unwrap();
        for value in &fc.mean {
            assert_relative_eq!(*value, y[299], epsilon = 1e-12);
        }
        assert_relative_eq!(fc.std_errors[4], (5.0 * fit.sigma2).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            fit_arima(&[1.0, 2.0, 3.0], ArimaOrder::new(2, 0, 2), true),
            Err(StatsError::InsufficientData { .. })
        ));
    }
}
