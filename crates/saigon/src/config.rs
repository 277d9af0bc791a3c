//! Run configuration.
//!
//! Every section deserializes with defaults, so a JSON file only needs the
//! fields it changes:
//!
//! ```json
//! { "analysis": { "forecast": { "symbol": "FPT" } } }
//! ```

use crate::universe::{BENCHMARK, Vn30Universe};
use chrono::NaiveDate;
use saigon_data::{AggregateConfig, cafef::CafefConfig};
use saigon_factors::{CapmConfig, PortfolioConfig, PriceField};
use saigon_output::ExportFormat;
use saigon_stats::{AdfConfig, AutoArimaConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid JSON for [`SaigonConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range or inconsistent
    #[error("invalid config value: {0}")]
    Invalid(String),
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

/// What to download and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Instruments, in fetch order
    pub symbols: Vec<String>,
    /// Benchmark index, fetched separately
    pub benchmark: String,
    /// First day requested
    pub start: NaiveDate,
    /// Last day requested
    pub end: NaiveDate,
    /// HTTP client settings
    pub client: CafefConfig,
    /// Failure policy and concurrency
    pub aggregate: AggregateConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            symbols: Vn30Universe::new().symbols(),
            benchmark: BENCHMARK.to_string(),
            start: date(2020, 1, 1),
            end: date(2025, 11, 21),
            client: CafefConfig::default(),
            aggregate: AggregateConfig::default(),
        }
    }
}

/// Locations of the data tables and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory of the raw and cleaned tables
    pub data_dir: PathBuf,
    /// Directory of the reports and charts
    pub output_dir: PathBuf,
    /// Raw constituent table
    pub universe_raw: String,
    /// Fallback raw constituent table
    pub universe_backup: String,
    /// Cleaned constituent prices
    pub universe_clean: String,
    /// Raw benchmark table
    pub benchmark_raw: String,
    /// Fallback raw benchmark table
    pub benchmark_backup: String,
    /// Cleaned benchmark prices
    pub benchmark_clean: String,
    /// Risk-free rate as downloaded (`Ngày`, `Lần cuối` columns)
    pub risk_free_source: String,
    /// Cleaned risk-free rate
    pub risk_free_clean: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            universe_raw: "VN30_raw_2020_2025.csv".to_string(),
            universe_backup: "VN30_raw_backup_2020_2025.csv".to_string(),
            universe_clean: "VN30_clean_2020_2025.csv".to_string(),
            benchmark_raw: "VNINDEX_raw_2020_2025.csv".to_string(),
            benchmark_backup: "VNINDEX_raw_backup_2020_2025.csv".to_string(),
            benchmark_clean: "VNINDEX_clean_2020_2025.csv".to_string(),
            risk_free_source: "Risk_Free_Rate_2020-2025.csv".to_string(),
            risk_free_clean: "Risk_Free_Rate_clean_2020-2025.csv".to_string(),
        }
    }
}

impl PathsConfig {
    /// Table `name` in the data directory.
    pub fn data(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    /// Report `name` in the output directory.
    pub fn output(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }
}

/// Single-instrument return forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Forecast instrument
    pub symbol: String,
    /// Business days ahead
    pub steps: usize,
    /// Significance of the confidence band (0.05 for 95 %)
    pub alpha: f64,
    /// Stationarity test settings
    pub adf: AdfConfig,
    /// Order search
    pub arima: AutoArimaConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            symbol: "VJC".to_string(),
            steps: 30,
            alpha: 0.05,
            adf: AdfConfig::default(),
            arima: AutoArimaConfig::default(),
        }
    }
}

/// Analytics settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Tickers first priced after this date are excluded
    pub coverage_start: NaiveDate,
    /// Price field pivoted into the panel
    pub price_field: PriceField,
    /// `|z|` above which a daily return counts as an outlier
    pub outlier_threshold: f64,
    /// Forecast settings
    pub forecast: ForecastConfig,
    /// CAPM settings
    pub capm: CapmConfig,
    /// Portfolio settings
    pub portfolio: PortfolioConfig,
    /// Format of the report tables
    pub format: ExportFormat,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            coverage_start: date(2020, 1, 2),
            price_field: PriceField::Close,
            outlier_threshold: 4.0,
            forecast: ForecastConfig::default(),
            capm: CapmConfig::default(),
            portfolio: PortfolioConfig::default(),
            format: ExportFormat::Csv,
        }
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaigonConfig {
    /// Download settings
    pub fetch: FetchConfig,
    /// File locations
    pub paths: PathsConfig,
    /// Analytics settings
    pub analysis: AnalysisConfig,
}

impl SaigonConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Check ranges and consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fetch = &self.fetch;
        if fetch.start > fetch.end {
            return Err(ConfigError::Invalid(format!(
                "fetch.start {} is after fetch.end {}",
                fetch.start, fetch.end
            )));
        }
        if fetch.symbols.iter().any(|s| s.trim().is_empty()) || fetch.benchmark.trim().is_empty() {
            return Err(ConfigError::Invalid("empty symbol".to_string()));
        }
        if !(0.0..=1.0).contains(&fetch.aggregate.max_failure_ratio) {
            return Err(ConfigError::Invalid(
                "fetch.aggregate.max_failure_ratio must be within [0, 1]".to_string(),
            ));
        }
        let forecast = &self.analysis.forecast;
        if forecast.steps == 0 {
            return Err(ConfigError::Invalid("analysis.forecast.steps must be positive".to_string()));
        }
        if !(forecast.alpha > 0.0 && forecast.alpha < 1.0) {
            return Err(ConfigError::Invalid(
                "analysis.forecast.alpha must be within (0, 1)".to_string(),
            ));
        }
        if self.analysis.outlier_threshold <= 0.0 {
            return Err(ConfigError::Invalid(
                "analysis.outlier_threshold must be positive".to_string(),
            ));
        }
        if self.analysis.portfolio.periods_per_year <= 0.0 {
            return Err(ConfigError::Invalid(
                "analysis.portfolio.periods_per_year must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
