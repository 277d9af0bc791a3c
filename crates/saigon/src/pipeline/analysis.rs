//! Analysis stages over the cleaned tables.
//!
//! `load → prepare → {eda, forecast, capm → portfolios}`. Every stage
//! borrows its settings from [`SaigonConfig`] and its input from the
//! previous stage.

use super::{IntoStageError, PipelineError, Stage, StageResultExt};
use crate::config::{AnalysisConfig, ForecastConfig, PathsConfig, SaigonConfig};
use chrono::NaiveDate;
use ndarray::Array2;
use saigon_data::store::{read_prices, read_risk_free};
use saigon_data::{PriceRecord, RiskFreeRecord};
use saigon_factors::calendar::next_business_days;
use saigon_factors::portfolio::cumulative_returns;
use saigon_factors::{
    CapmConfig, CapmEstimator, CapmResult, CapmSample, CoverageReport, FactorError, Panel,
    PortfolioBacktest, PortfolioConfig, PortfolioPerformance, ReturnSeries,
    daily_returns, monthly_returns, monthly_risk_free,
};
use saigon_stats::correlation::correlation_matrix;
use saigon_stats::descriptive::count_outliers;
use saigon_stats::{AdfResult, AutoArima, Forecast, Summary, adf_test, auto_arima, describe};
use std::path::Path;
use tracing::{info, warn};

/// Cleaned tables as read from disk.
#[derive(Debug, Clone)]
pub struct Inputs {
    /// Constituent prices
    pub prices: Vec<PriceRecord>,
    /// Benchmark prices
    pub benchmark: Vec<PriceRecord>,
    /// Annualized riskless rates
    pub risk_free: Vec<RiskFreeRecord>,
}

/// Reads the cleaned tables.
#[derive(Debug)]
pub struct LoadStage<'a> {
    paths: &'a PathsConfig,
}

impl<'a> LoadStage<'a> {
    /// Read from the tables named in `paths`.
    pub const fn new(paths: &'a PathsConfig) -> Self {
        Self { paths }
    }

    fn non_empty<T>(path: &Path, rows: Vec<T>) -> Result<Vec<T>, PipelineError> {
        if rows.is_empty() {
            return Err(PipelineError::empty(
                Self::NAME,
                format!("{} has no rows", path.display()),
            ));
        }
        info!(path = %path.display(), rows = rows.len(), "table loaded");
        Ok(rows)
    }
}

impl Stage for LoadStage<'_> {
    const NAME: &'static str = "load";
    type Input = ();
    type Output = Inputs;

    fn run(&self, _input: &()) -> Result<Inputs, PipelineError> {
        let prices_path = self.paths.data(&self.paths.universe_clean);
        let benchmark_path = self.paths.data(&self.paths.benchmark_clean);
        let risk_free_path = self.paths.data(&self.paths.risk_free_clean);

        let prices = read_prices(&prices_path).stage(Self::NAME)?;
        let benchmark = read_prices(&benchmark_path).stage(Self::NAME)?;
        let risk_free = read_risk_free(&risk_free_path).stage(Self::NAME)?;

        Ok(Inputs {
            prices: Self::non_empty(&prices_path, prices)?,
            benchmark: Self::non_empty(&benchmark_path, benchmark)?,
            risk_free: Self::non_empty(&risk_free_path, risk_free)?,
        })
    }
}

/// Panels shared by the downstream stages.
#[derive(Debug, Clone)]
pub struct Prepared {
    /// Every ticker of the cleaned table
    pub prices: Panel,
    /// History coverage of `prices`
    pub coverage: CoverageReport,
    /// Tickers with sufficient history only
    pub working: Panel,
    /// Daily returns of `working`
    pub daily: Panel,
    /// Monthly returns of `working`
    pub monthly: Panel,
    /// Benchmark prices, one column named after the benchmark
    pub benchmark: Panel,
    /// Monthly benchmark returns
    pub benchmark_monthly: Panel,
    /// Monthly riskless rate per month-end
    pub risk_free_monthly: Vec<(NaiveDate, f64)>,
}

/// Pivots the tables, filters coverage and computes returns.
#[derive(Debug)]
pub struct PrepareStage<'a> {
    config: &'a AnalysisConfig,
    benchmark: &'a str,
}

impl<'a> PrepareStage<'a> {
    /// Prepare with `config`; `benchmark` names the benchmark column.
    pub const fn new(config: &'a AnalysisConfig, benchmark: &'a str) -> Self {
        Self { config, benchmark }
    }

    fn benchmark_panel(&self, records: &[PriceRecord]) -> Result<Panel, PipelineError> {
        let panel = Panel::from_records(records, self.config.price_field).stage(Self::NAME)?;
        // A single-series table is the benchmark whatever its ticker label.
        let column = match panel.column_index(self.benchmark) {
            Some(_) => self.benchmark.to_string(),
            None if panel.ncols() == 1 => panel.columns()[0].clone(),
            None => {
                return Err(FactorError::UnknownTicker(self.benchmark.to_string())
                    .at_stage(Self::NAME));
            }
        };
        let (dates, values) = panel.column_series(&column).stage(Self::NAME)?;
        Panel::from_series(self.benchmark, dates, values).stage(Self::NAME)
    }
}

impl Stage for PrepareStage<'_> {
    const NAME: &'static str = "prepare";
    type Input = Inputs;
    type Output = Prepared;

    fn run(&self, input: &Inputs) -> Result<Prepared, PipelineError> {
        let prices = Panel::from_records(&input.prices, self.config.price_field).stage(Self::NAME)?;
        if prices.is_empty() {
            return Err(PipelineError::empty(Self::NAME, "price panel is empty"));
        }

        let coverage = CoverageReport::evaluate(&prices, self.config.coverage_start);
        let excluded = coverage.insufficient();
        if !excluded.is_empty() {
            warn!(
                start = %self.config.coverage_start,
                tickers = ?excluded,
                "insufficient history, excluded from the analysis"
            );
        }
        let working = coverage.apply(&prices).stage(Self::NAME)?;
        if working.ncols() == 0 {
            return Err(PipelineError::empty(
                Self::NAME,
                format!("no ticker is priced on or before {}", self.config.coverage_start),
            ));
        }

        let daily = daily_returns(&working).stage(Self::NAME)?;
        let monthly = monthly_returns(&working).stage(Self::NAME)?;
        let benchmark = self.benchmark_panel(&input.benchmark)?;
        let benchmark_monthly = monthly_returns(&benchmark).stage(Self::NAME)?;
        let risk_free_monthly = monthly_risk_free(&input.risk_free);

        info!(
            tickers = prices.ncols(),
            working = working.ncols(),
            days = working.nrows(),
            daily_returns = daily.nrows(),
            monthly_returns = monthly.nrows(),
            "panels prepared"
        );

        Ok(Prepared {
            prices,
            coverage,
            working,
            daily,
            monthly,
            benchmark,
            benchmark_monthly,
            risk_free_monthly,
        })
    }
}

/// Exploratory statistics of the working panel.
#[derive(Debug, Clone)]
pub struct Eda {
    /// Missing prices per ticker, largest first
    pub missing: Vec<(String, usize)>,
    /// Daily-return outliers per ticker, largest first
    pub outliers: Vec<(String, usize)>,
    /// Price statistics per ticker
    pub price_summary: Vec<(String, Summary)>,
    /// Daily-return statistics per ticker
    pub return_summary: Vec<(String, Summary)>,
    /// Tickers labelling `correlation`
    pub labels: Vec<String>,
    /// Pairwise price correlations
    pub correlation: Array2<f64>,
    /// Prices divided by their first value
    pub normalized: Panel,
}

/// Computes the exploratory statistics.
#[derive(Debug)]
pub struct EdaStage<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> EdaStage<'a> {
    /// Use the outlier threshold of `config`.
    pub const fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }
}

fn summarize(panel: &Panel) -> Vec<(String, Summary)> {
    panel
        .columns()
        .iter()
        .zip(panel.values().columns())
        .map(|(name, column)| (name.clone(), describe(&column.to_vec())))
        .collect()
}

impl Stage for EdaStage<'_> {
    const NAME: &'static str = "eda";
    type Input = Prepared;
    type Output = Eda;

    fn run(&self, input: &Prepared) -> Result<Eda, PipelineError> {
        let working = &input.working;

        let mut outliers: Vec<(String, usize)> = input
            .daily
            .columns()
            .iter()
            .zip(input.daily.values().columns())
            .map(|(name, column)| {
                let count = count_outliers(&column.to_vec(), self.config.outlier_threshold);
                (name.clone(), count)
            })
            .collect();
        outliers.sort_by(|a, b| b.1.cmp(&a.1));

        let eda = Eda {
            missing: working.missing_counts(),
            outliers,
            price_summary: summarize(working),
            return_summary: summarize(&input.daily),
            labels: working.columns().to_vec(),
            correlation: correlation_matrix(working.values()),
            normalized: working.normalized_to_first(),
        };
        info!(
            missing = eda.missing.iter().map(|(_, n)| n).sum::<usize>(),
            outliers = eda.outliers.iter().map(|(_, n)| n).sum::<usize>(),
            "exploratory statistics computed"
        );
        Ok(eda)
    }
}

/// Return forecast of one instrument.
#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    /// Forecast instrument
    pub symbol: String,
    /// Dates of the observed prices
    pub price_dates: Vec<NaiveDate>,
    /// Observed prices
    pub prices: Vec<f64>,
    /// Daily returns on the business-day calendar
    pub returns: ReturnSeries,
    /// Stationarity test of `returns`
    pub adf: AdfResult,
    /// Selected model and every candidate tried
    pub selection: AutoArima,
    /// Return forecast with confidence band
    pub forecast: Forecast,
    /// Business days of the forecast steps
    pub dates: Vec<NaiveDate>,
    /// Implied price path
    pub price_path: Vec<f64>,
}

/// Forecasts the daily return of one instrument with an ARIMA model.
#[derive(Debug)]
pub struct ForecastStage<'a> {
    config: &'a ForecastConfig,
}

impl<'a> ForecastStage<'a> {
    /// Forecast per `config`.
    pub const fn new(config: &'a ForecastConfig) -> Self {
        Self { config }
    }
}

/// `last_price · Π(1 + r̂)` along the forecast.
fn price_path(last_price: f64, returns: &[f64]) -> Vec<f64> {
    cumulative_returns(returns)
        .into_iter()
        .map(|growth| last_price * growth)
        .collect()
}

impl Stage for ForecastStage<'_> {
    const NAME: &'static str = "forecast";
    type Input = Prepared;
    type Output = ForecastOutcome;

    fn run(&self, input: &Prepared) -> Result<ForecastOutcome, PipelineError> {
        let symbol = &self.config.symbol;
        let (price_dates, prices) = input.working.column_series(symbol).stage(Self::NAME)?;

        let calendar = ReturnSeries::from_prices(&price_dates, &prices)
            .and_then(|series| series.reindex_business_days())
            .stage(Self::NAME)?;
        let (dates, values): (Vec<NaiveDate>, Vec<f64>) = calendar
            .dates
            .iter()
            .zip(&calendar.values)
            .filter(|(_, v)| v.is_finite())
            .map(|(d, v)| (*d, *v))
            .unzip();
        let returns = ReturnSeries { dates, values };

        let (Some(last_date), Some(last_price)) = (returns.dates.last(), prices.last()) else {
            return Err(PipelineError::empty(
                Self::NAME,
                format!("{symbol} has no defined daily return"),
            ));
        };

        let adf = adf_test(&returns.values, &self.config.adf).stage(Self::NAME)?;
        info!(
            %symbol,
            statistic = adf.statistic,
            p_value = adf.p_value,
            used_lag = adf.used_lag,
            stationary = adf.is_stationary(0.05),
            "ADF test"
        );

        let selection = auto_arima(&returns.values, &self.config.arima).stage(Self::NAME)?;
        let forecast = selection
            .best
            .forecast(self.config.steps, self.config.alpha)
            .stage(Self::NAME)?;
        let dates = next_business_days(*last_date, self.config.steps);
        let price_path = price_path(*last_price, &forecast.mean);

        info!(
            %symbol,
            order = %selection.best.order,
            steps = self.config.steps,
            last_price = *last_price,
            final_price = price_path.last().copied().unwrap_or(f64::NAN),
            "forecast produced"
        );

        Ok(ForecastOutcome {
            symbol: symbol.clone(),
            price_dates,
            prices,
            returns,
            adf,
            selection,
            forecast,
            dates,
            price_path,
        })
    }
}

/// Market-model regressions and the sample they were run on.
#[derive(Debug, Clone)]
pub struct CapmOutcome {
    /// Monthly returns, benchmark and riskless rate on common dates
    pub sample: CapmSample,
    /// One result per ticker that could be estimated
    pub results: Vec<CapmResult>,
}

/// Regresses monthly excess returns on the benchmark's.
#[derive(Debug)]
pub struct CapmStage<'a> {
    config: &'a CapmConfig,
    benchmark: &'a str,
}

impl<'a> CapmStage<'a> {
    /// Estimate per `config` against the `benchmark` column.
    pub const fn new(config: &'a CapmConfig, benchmark: &'a str) -> Self {
        Self { config, benchmark }
    }
}

impl Stage for CapmStage<'_> {
    const NAME: &'static str = "capm";
    type Input = Prepared;
    type Output = CapmOutcome;

    fn run(&self, input: &Prepared) -> Result<CapmOutcome, PipelineError> {
        let sample = CapmSample::align(
            &input.monthly,
            &input.benchmark_monthly,
            self.benchmark,
            &input.risk_free_monthly,
        )
        .stage(Self::NAME)?;

        let results = CapmEstimator::with_config(self.config.clone()).estimate(&sample);
        if results.is_empty() {
            return Err(PipelineError::empty(
                Self::NAME,
                format!("no ticker could be estimated on {} months", sample.dates.len()),
            ));
        }
        Ok(CapmOutcome { sample, results })
    }
}

/// Portfolio performances and the benchmark curve they are compared with.
#[derive(Debug, Clone)]
pub struct PortfolioOutcome {
    /// One entry per non-empty portfolio, high beta first
    pub performances: Vec<PortfolioPerformance>,
    /// Mean monthly riskless rate used for the Sharpe ratios
    pub mean_risk_free: f64,
    /// Benchmark returns on the CAPM sample dates
    pub benchmark: ReturnSeries,
    /// Compounded benchmark curve
    pub benchmark_cumulative: Vec<f64>,
}

/// Builds and evaluates the beta-sorted portfolios.
#[derive(Debug)]
pub struct PortfolioStage<'a> {
    config: &'a PortfolioConfig,
}

impl<'a> PortfolioStage<'a> {
    /// Evaluate per `config`.
    pub const fn new(config: &'a PortfolioConfig) -> Self {
        Self { config }
    }
}

impl Stage for PortfolioStage<'_> {
    const NAME: &'static str = "portfolios";
    type Input = CapmOutcome;
    type Output = PortfolioOutcome;

    fn run(&self, input: &CapmOutcome) -> Result<PortfolioOutcome, PipelineError> {
        let mean_risk_free = input.sample.mean_risk_free();
        let performances = PortfolioBacktest::with_config(self.config.clone())
            .run(&input.sample.returns, &input.results, mean_risk_free)
            .stage(Self::NAME)?;

        let benchmark = ReturnSeries {
            dates: input.sample.dates.clone(),
            values: input.sample.market.clone(),
        };
        Ok(PortfolioOutcome {
            benchmark_cumulative: cumulative_returns(&benchmark.values),
            performances,
            mean_risk_free,
            benchmark,
        })
    }
}

/// Everything computed from one set of cleaned tables.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Panels and coverage
    pub prepared: Prepared,
    /// Exploratory statistics
    pub eda: Eda,
    /// Return forecast, absent when it could not be produced
    pub forecast: Option<ForecastOutcome>,
    /// Market-model regressions
    pub capm: CapmOutcome,
    /// Beta-sorted portfolios
    pub portfolios: PortfolioOutcome,
}

/// Run every analysis stage on the cleaned tables named in `config`.
///
/// A forecast failure is logged and leaves [`Analysis::forecast`] empty;
/// any other failure aborts.
pub fn analyze(config: &SaigonConfig) -> Result<Analysis, PipelineError> {
    config.validate()?;
    let analysis = &config.analysis;
    let benchmark = config.fetch.benchmark.as_str();

    let inputs = LoadStage::new(&config.paths).execute(&())?;
    let prepared = PrepareStage::new(analysis, benchmark).execute(&inputs)?;
    let eda = EdaStage::new(analysis).execute(&prepared)?;
    let forecast = match ForecastStage::new(&analysis.forecast).execute(&prepared) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!(symbol = %analysis.forecast.symbol, error = %e, "forecast skipped");
            None
        }
    };
    let capm = CapmStage::new(&analysis.capm, benchmark).execute(&prepared)?;
    let portfolios = PortfolioStage::new(&analysis.portfolio).execute(&capm)?;

    Ok(Analysis {
        prepared,
        eda,
        forecast,
        capm,
        portfolios,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Synthetic cleaned tables shared by the pipeline tests.

    use crate::config::SaigonConfig;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use saigon_data::store::{write_prices, write_risk_free};
    use saigon_data::{PriceRecord, RiskFreeRecord};
    use saigon_factors::calendar::business_days;
    use saigon_stats::AutoArimaConfig;
    use std::path::PathBuf;

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("saigon-pipeline-{name}-{}", std::process::id()))
    }

    fn record(date: NaiveDate, ticker: &str, close: f64) -> PriceRecord {
        PriceRecord {
            date,
            ticker: ticker.to_string(),
            close,
            adj_close: close,
            open: close,
            high: close,
            low: close,
            volume: 1_000.0,
        }
    }

    /// Two years of prices: `AAA` (β 1.6), `BBB` (β 0.5), `CCC` (β 0.8), and
    /// `LATE`, first priced a year in.
    pub(crate) fn write_tables(dir: &str) -> SaigonConfig {
        let mut config = SaigonConfig::default();
        config.paths.data_dir = scratch(dir).join("data");
        config.paths.output_dir = scratch(dir).join("output");
        config.analysis.forecast.symbol = "AAA".to_string();
        config.analysis.forecast.steps = 10;
        config.analysis.forecast.arima = AutoArimaConfig {
            max_p: 1,
            max_d: 1,
            max_q: 1,
            ..AutoArimaConfig::default()
        };

        let days = business_days(date(2020, 1, 1), date(2021, 12, 31));
        let mut rng = StdRng::seed_from_u64(7);
        let betas = [("AAA", 1.6), ("BBB", 0.5), ("CCC", 0.8), ("LATE", 1.0)];
        let mut levels = [100.0, 50.0, 20.0, 10.0];
        let mut market = 1_000.0;

        let mut prices = Vec::new();
        let mut benchmark = Vec::new();
        for day in &days {
            let m: f64 = rng.gen_range(-0.015..0.015);
            market *= 1.0 + m;
            benchmark.push(record(*day, "VNINDEX", market));
            for ((ticker, beta), level) in betas.iter().zip(levels.iter_mut()) {
                let noise: f64 = rng.gen_range(-0.002..0.002);
                *level *= 1.0 + beta * m + noise;
                if *ticker == "LATE" && *day < date(2021, 1, 4) {
                    continue;
                }
                prices.push(record(*day, ticker, *level));
            }
        }

        let risk_free: Vec<RiskFreeRecord> = (1..=12)
            .flat_map(|m| [date(2020, m, 15), date(2021, m, 15)])
            .map(|d| RiskFreeRecord { date: d, rate: 0.03 })
            .collect();

        let paths = &config.paths;
        write_prices(&prices, &paths.data(&paths.universe_clean)).unwrap();
        write_prices(&benchmark, &paths.data(&paths.benchmark_clean)).unwrap();
        write_risk_free(&risk_free, &paths.data(&paths.risk_free_clean)).unwrap();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{date, scratch, write_tables};
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use saigon_factors::{AGGRESSIVE, STABLE};
    use std::fs;

    #[test]
    fn test_full_analysis() {
        let config = write_tables("analysis");
        let analysis = analyze(&config).unwrap();

        let prepared = &analysis.prepared;
        assert_eq!(prepared.coverage.insufficient(), vec!["LATE".to_string()]);
        assert_eq!(prepared.working.columns(), ["AAA", "BBB", "CCC"]);
        assert_eq!(prepared.daily.nrows(), prepared.working.nrows() - 1);
        assert_eq!(prepared.monthly.nrows(), 23);

        assert_eq!(analysis.eda.correlation.dim(), (3, 3));
        assert_eq!(analysis.eda.correlation[[1, 1]], 1.0);
        assert!(analysis.eda.missing.iter().all(|(_, n)| *n == 0));

        let forecast = analysis.forecast.as_ref().unwrap();
        assert_eq!(forecast.dates.len(), 10);
        assert_eq!(forecast.price_path.len(), 10);
        assert!(forecast.dates[0] > date(2021, 12, 31));
        assert!(forecast.forecast.lower[0] < forecast.forecast.upper[0]);

        let capm = &analysis.capm;
        assert_eq!(capm.results.len(), 3);
        let beta = |t: &str| capm.results.iter().find(|r| r.ticker == t).unwrap().beta;
        assert!(beta("AAA") > 1.3);
        assert!(beta("BBB") < 0.8);

        let performances = &analysis.portfolios.performances;
        assert_eq!(performances.len(), 2);
        assert_eq!(performances[0].portfolio.name, AGGRESSIVE);
        assert_eq!(performances[0].portfolio.tickers, vec!["AAA".to_string()]);
        assert_eq!(performances[1].portfolio.name, STABLE);
        assert_eq!(
            analysis.portfolios.benchmark_cumulative.len(),
            capm.sample.dates.len()
        );

        fs::remove_dir_all(scratch("analysis")).ok();
    }

    #[test]
    fn test_missing_table_names_load_stage() {
        let mut config = SaigonConfig::default();
        config.paths.data_dir = scratch("missing");
        let err = analyze(&config).unwrap_err();
        assert_eq!(err.stage(), Some("load"));
    }

    #[test]
    fn test_unknown_forecast_symbol_is_skipped() {
        let mut config = write_tables("skip-forecast");
        config.analysis.forecast.symbol = "LATE".to_string();
        let analysis = analyze(&config).unwrap();
        assert!(analysis.forecast.is_none());
        assert_eq!(analysis.capm.results.len(), 3);

        fs::remove_dir_all(scratch("skip-forecast")).ok();
    }

    #[test]
    fn test_benchmark_label_is_not_required() {
        let config = write_tables("label");
        let mut inputs = LoadStage::new(&config.paths).execute(&()).unwrap();
        for record in &mut inputs.benchmark {
            record.ticker = "VN-Index".to_string();
        }
        let prepared = PrepareStage::new(&config.analysis, "VNINDEX")
            .execute(&inputs)
            .unwrap();
        assert_eq!(prepared.benchmark.columns(), ["VNINDEX"]);

        fs::remove_dir_all(scratch("label")).ok();
    }

    #[rstest]
    #[case(&[0.1, -0.1], &[110.0, 99.0])]
    #[case(&[0.0, 0.0, 0.0], &[100.0, 100.0, 100.0])]
    #[case(&[], &[])]
    fn test_price_path_compounds(#[case] returns: &[f64], #[case] expected: &[f64]) {
        let path = price_path(100.0, returns);
        assert_eq!(path.len(), expected.len());
        for (got, want) in path.iter().zip(expected) {
            assert_relative_eq!(*got, *want, epsilon = 1e-9);
        }
    }
}
