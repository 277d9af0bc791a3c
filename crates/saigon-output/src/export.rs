//! Export of analysis tables to CSV and JSON.
//!
//! Every report is a slice of row structs whose serde field names are the
//! column headers of the written file. Files are replaced atomically.

use chrono::NaiveDate;
use saigon_data::DataError;
use saigon_data::store::write_atomic;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Atomic file replacement failed.
    #[error(transparent)]
    Store(#[from] DataError),
}

/// Export format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Comma-separated values format.
    #[default]
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Write `contents` to `path` through [`write_atomic`]. Parent directories
/// are created as needed.
pub fn write_file(path: &Path, contents: &[u8]) -> Result<(), ExportError> {
    write_atomic(path, |file| Ok(file.write_all(contents)?))?;
    debug!(path = %path.display(), bytes = contents.len(), "file written");
    Ok(())
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format, replacing it
    /// atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        write_file(path, content.as_bytes())
    }
}

impl<T: Serialize> Exporter for [T] {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                for record in self {
                    wtr.serialize(record)?;
                }
                let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
                String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

/// Missing prices of one ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissingValueRow {
    /// Ticker.
    #[serde(rename = "Ticker")]
    pub ticker: String,

    /// Number of dates without a price.
    #[serde(rename = "Missing")]
    pub missing: usize,
}

/// Daily-return outliers of one ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutlierRow {
    /// Ticker.
    #[serde(rename = "Ticker")]
    pub ticker: String,

    /// Number of returns beyond the z-score threshold.
    #[serde(rename = "Outliers")]
    pub outliers: usize,
}

/// Descriptive statistics of one series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryRow {
    /// Ticker.
    #[serde(rename = "Ticker")]
    pub ticker: String,
    /// Number of observations.
    pub count: usize,
    /// Mean.
    pub mean: f64,
    /// Sample standard deviation.
    pub std: f64,
    /// Minimum.
    pub min: f64,
    /// First quartile.
    #[serde(rename = "25%")]
    pub q25: f64,
    /// Median.
    #[serde(rename = "50%")]
    pub median: f64,
    /// Third quartile.
    #[serde(rename = "75%")]
    pub q75: f64,
    /// Maximum.
    pub max: f64,
}

/// History coverage of one ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoverageRow {
    /// Ticker.
    #[serde(rename = "Ticker")]
    pub ticker: String,

    /// First date with a valid price.
    #[serde(rename = "First_Date")]
    pub first_date: Option<NaiveDate>,

    /// Whether the ticker entered the working panel.
    #[serde(rename = "Sufficient")]
    pub sufficient: bool,
}

/// Augmented Dickey-Fuller test outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdfRow {
    /// Tested series.
    #[serde(rename = "Ticker")]
    pub ticker: String,
    /// Test statistic.
    #[serde(rename = "ADF_Statistic")]
    pub statistic: f64,
    /// MacKinnon approximate p-value.
    #[serde(rename = "p_value")]
    pub p_value: f64,
    /// Lagged differences used.
    #[serde(rename = "Used_Lag")]
    pub used_lag: usize,
    /// Observations in the test regression.
    #[serde(rename = "N_obs")]
    pub nobs: usize,
    /// 1 % critical value.
    #[serde(rename = "Critical_1%")]
    pub critical_1: f64,
    /// 5 % critical value.
    #[serde(rename = "Critical_5%")]
    pub critical_5: f64,
    /// 10 % critical value.
    #[serde(rename = "Critical_10%")]
    pub critical_10: f64,
    /// Whether the unit root is rejected at 5 %.
    #[serde(rename = "Stationary")]
    pub stationary: bool,
}

/// One forecast step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastRow {
    /// Business day of the step.
    pub date: NaiveDate,
    /// Point forecast of the return.
    pub forecast_return: f64,
    /// Lower confidence bound.
    pub lower_ci: f64,
    /// Upper confidence bound.
    pub upper_ci: f64,
    /// Implied price path.
    pub price_forecast: f64,
}

/// Score of one ARIMA order tried during selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateRow {
    /// Order label, e.g. `ARIMA(1,0,1)`.
    #[serde(rename = "Order")]
    pub order: String,
    /// Akaike information criterion.
    #[serde(rename = "AIC")]
    pub aic: f64,
    /// Bayesian information criterion.
    #[serde(rename = "BIC")]
    pub bic: f64,
}

/// CAPM regression output of one ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapmRow {
    /// Ticker.
    #[serde(rename = "Ticker")]
    pub ticker: String,
    /// Intercept.
    #[serde(rename = "Alpha")]
    pub alpha: f64,
    /// Market sensitivity.
    #[serde(rename = "Beta")]
    pub beta: f64,
    /// t-statistic of alpha.
    #[serde(rename = "Alpha_tstat")]
    pub alpha_tstat: f64,
    /// t-statistic of beta.
    #[serde(rename = "Beta_tstat")]
    pub beta_tstat: f64,
    /// p-value of alpha.
    #[serde(rename = "Alpha_pvalue")]
    pub alpha_pvalue: f64,
    /// p-value of beta.
    #[serde(rename = "Beta_pvalue")]
    pub beta_pvalue: f64,
    /// Coefficient of determination.
    #[serde(rename = "R2")]
    pub r2: f64,
    /// Adjusted R².
    #[serde(rename = "Adj_R2")]
    pub adj_r2: f64,
    /// Observations.
    #[serde(rename = "N_obs")]
    pub nobs: usize,
}

/// Performance of one portfolio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioMetricsRow {
    /// Portfolio name.
    #[serde(rename = "Portfolio")]
    pub portfolio: String,
    /// Number of members.
    #[serde(rename = "Members")]
    pub members: usize,
    /// Mean return times 12.
    #[serde(rename = "Annualized Return")]
    pub annualized_return: f64,
    /// Standard deviation times √12.
    #[serde(rename = "Volatility")]
    pub volatility: f64,
    /// Sharpe ratio.
    #[serde(rename = "Sharpe Ratio")]
    pub sharpe_ratio: f64,
    /// Compounded return over the sample.
    #[serde(rename = "Total Return")]
    pub total_return: f64,
    /// Maximum drawdown.
    #[serde(rename = "Max Drawdown")]
    pub max_drawdown: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use rstest::rstest;

    fn capm_row(ticker: &str, beta: f64) -> CapmRow {
        CapmRow {
            ticker: ticker.to_string(),
            alpha: 0.001,
            beta,
            alpha_tstat: 0.5,
            beta_tstat: 8.0,
            alpha_pvalue: 0.6,
            beta_pvalue: 0.0,
            r2: 0.5,
            adj_r2: 0.49,
            nobs: 70,
        }
    }

    #[test]
    fn test_capm_csv_headers() {
        let rows = vec![capm_row("VJC", 0.8), capm_row("SSI", 1.3)];
        let csv = rows.export_to_string(ExportFormat::Csv).unwrap();
        let header = csv.lines().next().unwrap();
        assert_eq!(
            header,
            "Ticker,Alpha,Beta,Alpha_tstat,Beta_tstat,Alpha_pvalue,Beta_pvalue,R2,Adj_R2,N_obs"
        );
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.contains("SSI,0.001,1.3"));
    }

    #[test]
    fn test_summary_quartile_headers() {
        let rows = [SummaryRow {
            ticker: "ACB".to_string(),
            count: 4,
            mean: 1.0,
            std: 0.5,
            min: 0.0,
            q25: 0.5,
            median: 1.0,
            q75: 1.5,
            max: 2.0,
        }];
        let csv = rows.export_to_string(ExportFormat::Csv).unwrap();
        assert!(csv.starts_with("Ticker,count,mean,std,min,25%,50%,75%,max\n"));
    }

    #[test]
    fn test_missing_coverage_date_is_empty_field() {
        let rows = [CoverageRow {
            ticker: "NEW".to_string(),
            first_date: None,
            sufficient: false,
        }];
        let csv = rows.export_to_string(ExportFormat::Csv).unwrap();
        assert_eq!(csv.lines().nth(1), Some("NEW,,false"));
    }

    #[test]
    fn test_json_formats() {
        let rows = vec![capm_row("VJC", 0.8)];
        let compact = rows.export_to_string(ExportFormat::Json).unwrap();
        assert!(compact.contains("\"Ticker\":\"VJC\""));
        let pretty = rows.export_to_string(ExportFormat::PrettyJson).unwrap();
        assert!(pretty.contains("  "));
    }

    #[rstest]
    #[case("csv", ExportFormat::Csv)]
    #[case("JSON", ExportFormat::Json)]
    #[case("pretty-json", ExportFormat::PrettyJson)]
    fn test_format_from_str(#[case] input: &str, #[case] expected: ExportFormat) {
        assert_eq!(input.parse::<ExportFormat>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_format() {
        assert!(matches!("xml".parse::<ExportFormat>(), Err(ExportError::InvalidFormat(_))));
    }

    #[test]
    fn test_export_format_extension() {
        assert_eq!(ExportFormat::Csv.extension(), "csv");
        assert_eq!(ExportFormat::Json.extension(), "json");
        assert_eq!(ExportFormat::PrettyJson.extension(), "json");
    }

    #[test]
    fn test_export_to_file_replaces_atomically() {
        let dir = std::env::temp_dir().join(format!("saigon-export-{}", std::process::id()));
        let path = dir.join("nested").join("capm.csv");

        vec![capm_row("VJC", 0.8)].export_to_file(&path, ExportFormat::Csv).unwrap();
        vec![capm_row("SSI", 1.3)].export_to_file(&path, ExportFormat::Csv).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("SSI"));
        assert!(!content.contains("VJC"));
        let names: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["capm.csv"]);

        fs::remove_dir_all(dir).ok();
    }
}
