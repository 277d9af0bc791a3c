//! ARIMA modelling: estimation, order selection and forecasting.
//!
//! # Example
//!
//! ```
//! use saigon_stats::arima::{AutoArimaConfig, auto_arima};
//!
//! # fn main() -> saigon_stats::Result<()> {
//! let mut state = 7_u64;
//! let returns: Vec<f64> = (0..250)
//!     .map(|_| {
//!         state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
//!         ((state >> 33) as f64 / (1_u64 << 31) as f64 - 0.5) / 50.0
//!     })
//!     .collect();
//! let selected = auto_arima(&returns, &AutoArimaConfig::default())?;
//! let forecast = selected.best.forecast(30, 0.05)?;
//! assert_eq!(forecast.mean.len(), 30);
//! # Ok(())
//! # }
//! ```

mod model;
mod optimize;
mod selection;

pub use model::{ArimaFit, Forecast, difference, fit_arima};
pub use optimize::{Minimum, NelderMeadConfig, nelder_mead};
pub use selection::{AutoArima, AutoArimaConfig, CandidateScore, auto_arima, ndiffs};

use serde::{Deserialize, Serialize};

/// Orders of the autoregressive, differencing and moving-average parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    /// AR order
    pub p: usize,
    /// Differencing order
    pub d: usize,
    /// MA order
    pub q: usize,
}

impl ArimaOrder {
    /// Create an order triple.
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl std::fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}
