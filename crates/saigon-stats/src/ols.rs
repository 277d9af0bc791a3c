//! Ordinary least squares.
//!
//! Classical (homoskedastic) standard errors, two-sided Student-t p-values
//! with `n - k` degrees of freedom, and the Gaussian log-likelihood used for
//! information criteria.

use crate::error::{Result, StatsError};
use crate::matrix::invert;
use ndarray::{Array1, Array2, ArrayView1, Axis, s};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::f64::consts::PI;

/// Fitted linear regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OlsFit {
    /// Coefficients, in design-matrix column order
    pub params: Array1<f64>,
    /// Standard errors of the coefficients
    pub std_errors: Array1<f64>,
    /// t-statistics
    pub t_values: Array1<f64>,
    /// Two-sided p-values
    pub p_values: Array1<f64>,
    /// Coefficient of determination
    pub r_squared: f64,
    /// R² adjusted for the number of regressors
    pub adj_r_squared: f64,
    /// Sum of squared residuals
    pub ssr: f64,
    /// Number of observations
    pub nobs: usize,
    /// Residual degrees of freedom (`nobs - k`)
    pub df_resid: usize,
    /// Whether the design matrix carries an intercept column
    pub has_constant: bool,
}

impl OlsFit {
    /// Gaussian log-likelihood at the estimate.
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -n / 2.0 * ((2.0 * PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion, counting every regressor.
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.params.len() as f64
    }

    /// Bayesian information criterion.
    pub fn bic(&self) -> f64 {
        -2.0 * self.log_likelihood() + (self.nobs as f64).ln() * self.params.len() as f64
    }
}

/// Prepend a column of ones to a regressor matrix.
pub fn add_constant(x: &Array2<f64>) -> Array2<f64> {
    let mut design = Array2::<f64>::ones((x.nrows(), x.ncols() + 1));
    design.slice_mut(s![.., 1..]).assign(x);
    design
}

/// Design matrix `[1, x]` for a single regressor.
pub fn with_intercept(x: ArrayView1<'_, f64>) -> Array2<f64> {
    add_constant(&x.to_owned().insert_axis(Axis(1)))
}

/// Fit `y = X b + e` by least squares.
///
/// `has_constant` tells whether one column of `x` is an intercept; it
/// selects between centered and uncentered R².
///
/// # Errors
/// `DimensionMismatch` when `y` and `x` disagree, `InsufficientData` when
/// there are no residual degrees of freedom, `Singular` for collinear
/// regressors.
pub fn ols(y: &Array1<f64>, x: &Array2<f64>, has_constant: bool) -> Result<OlsFit> {
    let n = y.len();
    let k = x.ncols();

    if x.nrows() != n {
        return Err(StatsError::DimensionMismatch {
            expected: n,
            actual: x.nrows(),
        });
    }
    if n <= k {
        return Err(StatsError::InsufficientData {
            required: k + 1,
            actual: n,
        });
    }

    let xtx_inv = invert(&x.t().dot(x))?;
    let params = xtx_inv.dot(&x.t().dot(y));

    let residuals = y - &x.dot(&params);
    let ssr = residuals.dot(&residuals);
    let df_resid = n - k;
    let sigma2 = ssr / df_resid as f64;

    let std_errors = xtx_inv.diag().mapv(|v| (v * sigma2).max(0.0).sqrt());
    let t_values = &params / &std_errors;

    let t_dist = StudentsT::new(0.0, 1.0, df_resid as f64)
        .map_err(|e| StatsError::Distribution(e.to_string()))?;
    let p_values = t_values.mapv(|t| {
        if t.is_finite() {
            2.0 * (1.0 - t_dist.cdf(t.abs()))
        } else {
            0.0
        }
    });

    let tss = if has_constant {
        let mean = y.mean().unwrap_or(0.0);
        y.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
    } else {
        y.dot(y)
    };
    let r_squared = if tss > 0.0 { 1.0 - ssr / tss } else { 0.0 };
    let df_total = if has_constant { (n - 1) as f64 } else { n as f64 };
    let adj_r_squared = 1.0 - (1.0 - r_squared) * df_total / df_resid as f64;

    Ok(OlsFit {
        params,
        std_errors,
        t_values,
        p_values,
        r_squared,
        adj_r_squared,
        ssr,
        nobs: n,
        df_resid,
        has_constant,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_exact_line() {
        let x = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = x.mapv(|v| 2.0 + 3.0 * v);
        let fit = ols(&y, &with_intercept(x.view()), true).unwrap();
        assert_relative_eq!(fit.params[0], 2.0, epsilon = 1e-10);
        assert_relative_eq!(fit.params[1], 3.0, epsilon = 1e-10);
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_textbook_statistics() {
        // Hand-computed: slope 0.6, intercept 2.2, R² = 0.6, s.e.(slope) = 0.2828...
        let x = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = array![2.0, 4.0, 5.0, 4.0, 5.0];
        let fit = ols(&y, &with_intercept(x.view()), true).unwrap();

        assert_relative_eq!(fit.params[0], 2.2, epsilon = 1e-10);
        assert_relative_eq!(fit.params[1], 0.6, epsilon = 1e-10);
        assert_relative_eq!(fit.r_squared, 0.6, epsilon = 1e-10);
        assert_relative_eq!(fit.adj_r_squared, 1.0 - 0.4 * 4.0 / 3.0, epsilon = 1e-10);
        assert_relative_eq!(fit.std_errors[1], (0.8_f64 / 10.0).sqrt(), epsilon = 1e-10);
        assert_relative_eq!(fit.t_values[1], 0.6 / (0.08_f64).sqrt(), epsilon = 1e-10);
        assert_eq!(fit.df_resid, 3);
        assert!(fit.p_values[1] > 0.1 && fit.p_values[1] < 0.15);
    }

    #[test]
    fn test_slope_recovered_under_noise() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 500;
        let x = Array1::from_iter((0..n).map(|_| rng.gen_range(-0.1..0.1)));
        let noise = Array1::from_iter((0..n).map(|_| rng.gen_range(-0.005..0.005)));
        let y = x.mapv(|v| 0.002 + 1.3 * v) + noise;

        let fit = ols(&y, &with_intercept(x.view()), true).unwrap();
        assert_relative_eq!(fit.params[1], 1.3, epsilon = 0.02);
        assert!(fit.p_values[1] < 1e-10);
        assert!(fit.r_squared > 0.95);
    }

    #[test]
    fn test_insufficient_observations() {
        let x = array![1.0, 2.0];
        let y = array![1.0, 2.0];
        assert!(matches!(
            ols(&y, &with_intercept(x.view()), true),
            Err(StatsError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_collinear_regressors() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0]];
        let y = array![1.0, 2.0, 3.0, 5.0];
        assert!(matches!(ols(&y, &x, false), Err(StatsError::Singular(_))));
    }
}
