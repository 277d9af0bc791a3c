//! Report tables and charts of an [`Analysis`].

use super::analysis::{Analysis, Eda, ForecastOutcome, PortfolioOutcome, Prepared};
use super::{PipelineError, Stage, StageResultExt};
use crate::config::{PathsConfig, SaigonConfig};
use chrono::NaiveDate;
use saigon_factors::{CapmResult, Panel};
use saigon_output::{
    AdfRow, Band, CandidateRow, CapmRow, CoverageRow, ExportFormat, Exporter, ForecastRow,
    LineChart, LineSeries, MissingValueRow, OutlierRow, PALETTE, PortfolioMetricsRow, SummaryRow,
    correlation_heatmap, write_svg,
};
use saigon_stats::Summary;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// CAPM results as report rows.
pub fn capm_rows(results: &[CapmResult]) -> Vec<CapmRow> {
    results
        .iter()
        .map(|r| CapmRow {
            ticker: r.ticker.clone(),
            alpha: r.alpha,
            beta: r.beta,
            alpha_tstat: r.alpha_t,
            beta_tstat: r.beta_t,
            alpha_pvalue: r.alpha_p,
            beta_pvalue: r.beta_p,
            r2: r.r_squared,
            adj_r2: r.adj_r_squared,
            nobs: r.nobs,
        })
        .collect()
}

/// Portfolio metrics as report rows.
pub fn portfolio_rows(outcome: &PortfolioOutcome) -> Vec<PortfolioMetricsRow> {
    outcome
        .performances
        .iter()
        .map(|p| PortfolioMetricsRow {
            portfolio: p.portfolio.name.clone(),
            members: p.portfolio.len(),
            annualized_return: p.metrics.annualized_return,
            volatility: p.metrics.volatility,
            sharpe_ratio: p.metrics.sharpe_ratio,
            total_return: p.metrics.total_return,
            max_drawdown: p.metrics.max_drawdown,
        })
        .collect()
}

fn summary_rows(summaries: &[(String, Summary)]) -> Vec<SummaryRow> {
    summaries
        .iter()
        .map(|(ticker, s)| SummaryRow {
            ticker: ticker.clone(),
            count: s.count,
            mean: s.mean,
            std: s.std,
            min: s.min,
            q25: s.q25,
            median: s.median,
            q75: s.q75,
            max: s.max,
        })
        .collect()
}

fn coverage_rows(prepared: &Prepared) -> Vec<CoverageRow> {
    prepared
        .coverage
        .entries
        .iter()
        .map(|e| CoverageRow {
            ticker: e.ticker.clone(),
            first_date: e.first_date,
            sufficient: e.sufficient,
        })
        .collect()
}

fn forecast_rows(outcome: &ForecastOutcome) -> Vec<ForecastRow> {
    let f = &outcome.forecast;
    outcome
        .dates
        .iter()
        .enumerate()
        .map(|(i, date)| ForecastRow {
            date: *date,
            forecast_return: f.mean[i],
            lower_ci: f.lower[i],
            upper_ci: f.upper[i],
            price_forecast: outcome.price_path[i],
        })
        .collect()
}

fn adf_row(outcome: &ForecastOutcome) -> AdfRow {
    let adf = &outcome.adf;
    AdfRow {
        ticker: outcome.symbol.clone(),
        statistic: adf.statistic,
        p_value: adf.p_value,
        used_lag: adf.used_lag,
        nobs: adf.nobs,
        critical_1: adf.critical_values.one_pct,
        critical_5: adf.critical_values.five_pct,
        critical_10: adf.critical_values.ten_pct,
        stationary: adf.is_stationary(0.05),
    }
}

fn candidate_rows(outcome: &ForecastOutcome) -> Vec<CandidateRow> {
    outcome
        .selection
        .candidates
        .iter()
        .map(|c| CandidateRow {
            order: c.order.to_string(),
            aic: c.aic,
            bic: c.bic,
        })
        .collect()
}

fn dated(dates: &[NaiveDate], values: &[f64]) -> Vec<(NaiveDate, f64)> {
    dates.iter().copied().zip(values.iter().copied()).collect()
}

fn trend_chart(normalized: &Panel) -> String {
    normalized
        .columns()
        .iter()
        .zip(normalized.values().columns())
        .enumerate()
        .fold(
            LineChart::new("Normalized Price Trend (VN30)").legend(false).grid(true),
            |chart, (i, (_, column))| {
                let points = dated(normalized.dates(), &column.to_vec());
                chart.series(LineSeries::new(PALETTE[i % PALETTE.len()], points).width(0.7))
            },
        )
        .render()
}

fn return_forecast_chart(outcome: &ForecastOutcome) -> String {
    let f = &outcome.forecast;
    let band = Band {
        color: "pink".to_string(),
        points: outcome
            .dates
            .iter()
            .enumerate()
            .map(|(i, d)| (*d, f.lower[i], f.upper[i]))
            .collect(),
    };
    LineChart::new(format!(
        "ARIMA Forecast - {} Daily Return ({} Business Days Ahead)",
        outcome.symbol,
        outcome.dates.len()
    ))
    .band(band)
    .series(
        LineSeries::new(PALETTE[0], dated(&outcome.returns.dates, &outcome.returns.values))
            .label("Actual Return")
            .width(0.8),
    )
    .series(LineSeries::new("red", dated(&outcome.dates, &f.mean)).label("Forecast Return"))
    .render()
}

fn price_forecast_chart(outcome: &ForecastOutcome) -> String {
    LineChart::new(format!(
        "ARIMA Forecast - {} Price ({} Business Days Ahead)",
        outcome.symbol,
        outcome.dates.len()
    ))
    .series(
        LineSeries::new(PALETTE[0], dated(&outcome.price_dates, &outcome.prices))
            .label("Actual Price"),
    )
    .series(
        LineSeries::new("red", dated(&outcome.dates, &outcome.price_path)).label("Forecast Price"),
    )
    .render()
}

fn cumulative_chart(outcome: &PortfolioOutcome, benchmark: &str) -> String {
    let chart = outcome.performances.iter().enumerate().fold(
        LineChart::new("Cumulative Return: Stable vs Aggressive Portfolio").grid(true),
        |chart, (i, p)| {
            chart.series(
                LineSeries::new(
                    PALETTE[i % PALETTE.len()],
                    dated(&p.returns.dates, &p.cumulative),
                )
                .label(p.portfolio.name.clone())
                .width(1.6),
            )
        },
    );
    chart
        .series(
            LineSeries::new(
                "black",
                dated(&outcome.benchmark.dates, &outcome.benchmark_cumulative),
            )
            .label(benchmark)
            .dashed(),
        )
        .render()
}

/// Writes every report table and chart into the output directory.
#[derive(Debug)]
pub struct ReportStage<'a> {
    paths: &'a PathsConfig,
    format: ExportFormat,
    benchmark: &'a str,
}

impl<'a> ReportStage<'a> {
    /// Write under `paths.output_dir`, tables in `format`.
    pub const fn new(paths: &'a PathsConfig, format: ExportFormat, benchmark: &'a str) -> Self {
        Self {
            paths,
            format,
            benchmark,
        }
    }

    fn table<T: Serialize>(
        &self,
        written: &mut Vec<PathBuf>,
        stem: &str,
        rows: &[T],
    ) -> Result<(), PipelineError> {
        let path = self
            .paths
            .output(&format!("{stem}.{}", self.format.extension()));
        rows.export_to_file(&path, self.format).stage(Self::NAME)?;
        written.push(path);
        Ok(())
    }

    fn chart(
        &self,
        written: &mut Vec<PathBuf>,
        stem: &str,
        svg: String,
    ) -> Result<(), PipelineError> {
        if svg.is_empty() {
            warn!(chart = stem, "nothing to draw, chart skipped");
            return Ok(());
        }
        let path = self.paths.output(&format!("{stem}.svg"));
        write_svg(&path, &svg).stage(Self::NAME)?;
        written.push(path);
        Ok(())
    }

    fn eda(
        &self,
        written: &mut Vec<PathBuf>,
        prepared: &Prepared,
        eda: &Eda,
    ) -> Result<(), PipelineError> {
        let missing: Vec<MissingValueRow> = eda
            .missing
            .iter()
            .map(|(ticker, missing)| MissingValueRow {
                ticker: ticker.clone(),
                missing: *missing,
            })
            .collect();
        let outliers: Vec<OutlierRow> = eda
            .outliers
            .iter()
            .map(|(ticker, outliers)| OutlierRow {
                ticker: ticker.clone(),
                outliers: *outliers,
            })
            .collect();

        self.table(written, "coverage_report", &coverage_rows(prepared))?;
        self.table(written, "missing_value_report", &missing)?;
        self.table(written, "outlier_report_daily", &outliers)?;
        self.table(written, "summary_price", &summary_rows(&eda.price_summary))?;
        self.table(written, "summary_daily_return", &summary_rows(&eda.return_summary))?;
        self.chart(
            written,
            "VN30_correlation_heatmap",
            correlation_heatmap("Correlation Heatmap VN30", &eda.labels, &eda.correlation),
        )?;
        self.chart(written, "VN30_normalized_trend", trend_chart(&eda.normalized))
    }

    fn forecast(
        &self,
        written: &mut Vec<PathBuf>,
        outcome: &ForecastOutcome,
    ) -> Result<(), PipelineError> {
        let symbol = &outcome.symbol;
        self.table(written, &format!("ADF_test_{symbol}"), &[adf_row(outcome)])?;
        self.table(
            written,
            &format!("{symbol}_arima_candidates"),
            &candidate_rows(outcome),
        )?;
        self.table(
            written,
            &format!("{symbol}_ARIMA_forecast_return"),
            &forecast_rows(outcome),
        )?;
        self.chart(
            written,
            &format!("{symbol}_ARIMA_return_forecast"),
            return_forecast_chart(outcome),
        )?;
        self.chart(
            written,
            &format!("{symbol}_ARIMA_price_forecast"),
            price_forecast_chart(outcome),
        )
    }
}

impl Stage for ReportStage<'_> {
    const NAME: &'static str = "report";
    type Input = Analysis;
    type Output = Vec<PathBuf>;

    fn run(&self, input: &Analysis) -> Result<Vec<PathBuf>, PipelineError> {
        let mut written = Vec::new();

        self.eda(&mut written, &input.prepared, &input.eda)?;
        if let Some(outcome) = &input.forecast {
            self.forecast(&mut written, outcome)?;
        }
        self.table(
            &mut written,
            "CAPM_results_realRF",
            &capm_rows(&input.capm.results),
        )?;
        self.table(
            &mut written,
            "Portfolio_metrics_complete",
            &portfolio_rows(&input.portfolios),
        )?;
        self.chart(
            &mut written,
            "Portfolio_cumulative_return_complete",
            cumulative_chart(&input.portfolios, self.benchmark),
        )?;

        info!(
            files = written.len(),
            dir = %self.paths.output_dir.display(),
            "reports written"
        );
        Ok(written)
    }
}

/// Write the reports of `analysis` where `config` says.
pub fn write_reports(
    analysis: &Analysis,
    config: &SaigonConfig,
) -> Result<Vec<PathBuf>, PipelineError> {
    ReportStage::new(
        &config.paths,
        config.analysis.format,
        &config.fetch.benchmark,
    )
    .execute(analysis)
}
