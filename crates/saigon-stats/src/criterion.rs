//! Model-selection criteria.

use crate::ols::OlsFit;
use serde::{Deserialize, Serialize};

/// Information criterion used to rank candidate models (lower is better).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InformationCriterion {
    /// Akaike: `-2 ln L + 2k`
    #[default]
    Aic,
    /// Schwarz/Bayesian: `-2 ln L + k ln n`
    Bic,
}

impl InformationCriterion {
    /// Value of the criterion for a log-likelihood with `k` parameters
    /// estimated from `n` observations.
    pub fn value(self, log_likelihood: f64, k: usize, n: usize) -> f64 {
        match self {
            Self::Aic => -2.0 * log_likelihood + 2.0 * k as f64,
            Self::Bic => -2.0 * log_likelihood + (n as f64).ln() * k as f64,
        }
    }

    /// Value of the criterion for a least-squares fit.
    pub fn of_ols(self, fit: &OlsFit) -> f64 {
        match self {
            Self::Aic => fit.aic(),
            Self::Bic => fit.bic(),
        }
    }
}

impl std::fmt::Display for InformationCriterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aic => write!(f, "AIC"),
            Self::Bic => write!(f, "BIC"),
        }
    }
}
