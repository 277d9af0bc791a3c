//! Acquisition: fetch raw histories, persist them, clean and persist again.
//!
//! The constituents and the benchmark are collected separately, each with
//! its own backup table. The risk-free rate is not fetched; its source table
//! is cleaned when present.

use super::{PipelineError, StageResultExt};
use crate::config::{FetchConfig, PathsConfig, SaigonConfig};
use saigon_data::store::{read_string_table, write_frame, write_prices, write_risk_free};
use saigon_data::{
    Aggregator, Grouping, HistorySource, InstrumentReport, NormalizeReport, normalize_prices,
    normalize_risk_free,
};
use std::path::PathBuf;
use tracing::{info, warn};

const STAGE: &str = "acquire";

/// What happened to one collected table.
#[derive(Debug, Clone)]
pub struct TableSummary {
    /// Raw table written
    pub raw_path: PathBuf,
    /// Cleaned table written
    pub clean_path: PathBuf,
    /// Per-instrument outcomes, in fetch order
    pub outcomes: Vec<InstrumentReport>,
    /// Cleaning statistics
    pub report: NormalizeReport,
}

impl TableSummary {
    /// Instruments that ended without data.
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|r| r.outcome.is_failed())
            .map(|r| r.symbol.as_str())
            .collect()
    }
}

/// Outcome of a full acquisition run.
#[derive(Debug, Clone)]
pub struct AcquisitionSummary {
    /// Constituent table
    pub universe: TableSummary,
    /// Benchmark table
    pub benchmark: TableSummary,
    /// Risk-free cleaning statistics, absent when the source is missing
    pub risk_free: Option<NormalizeReport>,
}

struct TablePaths {
    raw: PathBuf,
    backup: PathBuf,
    clean: PathBuf,
}

async fn collect_table<S, F>(
    source: &S,
    fetch: &FetchConfig,
    symbols: &[String],
    paths: TablePaths,
    grouping: Grouping,
    on_progress: F,
) -> Result<TableSummary, PipelineError>
where
    S: HistorySource + Sync,
    F: FnMut(&InstrumentReport),
{
    let mut collection = Aggregator::new(source, fetch.aggregate.clone())
        .with_backup(&paths.backup)
        .collect_with_progress(symbols, fetch.start, fetch.end, on_progress)
        .await
        .stage(STAGE)?;

    if collection.frame.height() == 0 {
        return Err(PipelineError::empty(
            STAGE,
            format!("no rows collected for {}", symbols.join(", ")),
        ));
    }
    write_frame(&mut collection.frame, &paths.raw).stage(STAGE)?;
    info!(path = %paths.raw.display(), rows = collection.frame.height(), "raw table written");

    let normalized = normalize_prices(&collection.frame, grouping).stage(STAGE)?;
    write_prices(&normalized.records, &paths.clean).stage(STAGE)?;
    info!(
        path = %paths.clean.display(),
        rows = normalized.report.rows_out,
        filled = normalized.report.values_filled,
        duplicates = normalized.report.duplicates_removed,
        "clean table written"
    );

    Ok(TableSummary {
        raw_path: paths.raw,
        clean_path: paths.clean,
        outcomes: collection.outcomes,
        report: normalized.report,
    })
}

fn clean_risk_free(paths: &PathsConfig) -> Result<Option<NormalizeReport>, PipelineError> {
    let source = paths.data(&paths.risk_free_source);
    if !source.is_file() {
        warn!(path = %source.display(), "risk-free source missing, not cleaned");
        return Ok(None);
    }
    let table = read_string_table(&source).stage(STAGE)?;
    let normalized = normalize_risk_free(&table).stage(STAGE)?;
    let clean = paths.data(&paths.risk_free_clean);
    write_risk_free(&normalized.records, &clean).stage(STAGE)?;
    info!(path = %clean.display(), rows = normalized.report.rows_out, "risk-free table written");
    Ok(Some(normalized.report))
}

/// Fetch the constituents then the benchmark from `source`, writing raw and
/// cleaned tables under the data directory, then clean the risk-free source.
///
/// `on_progress` is called once per instrument, constituents first.
pub async fn acquire<S, F>(
    source: &S,
    config: &SaigonConfig,
    mut on_progress: F,
) -> Result<AcquisitionSummary, PipelineError>
where
    S: HistorySource + Sync,
    F: FnMut(&InstrumentReport),
{
    config.validate()?;
    let fetch = &config.fetch;
    let paths = &config.paths;
    info!(
        instruments = fetch.symbols.len(),
        benchmark = %fetch.benchmark,
        start = %fetch.start,
        end = %fetch.end,
        "acquisition started"
    );

    let universe = collect_table(
        source,
        fetch,
        &fetch.symbols,
        TablePaths {
            raw: paths.data(&paths.universe_raw),
            backup: paths.data(&paths.universe_backup),
            clean: paths.data(&paths.universe_clean),
        },
        Grouping::PerInstrument,
        &mut on_progress,
    )
    .await?;

    let benchmark = collect_table(
        source,
        fetch,
        std::slice::from_ref(&fetch.benchmark),
        TablePaths {
            raw: paths.data(&paths.benchmark_raw),
            backup: paths.data(&paths.benchmark_backup),
            clean: paths.data(&paths.benchmark_clean),
        },
        Grouping::Global,
        &mut on_progress,
    )
    .await?;

    let risk_free = clean_risk_free(paths)?;

    Ok(AcquisitionSummary {
        universe,
        benchmark,
        risk_free,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use polars::prelude::*;
    use saigon_data::records::{RAW_COLUMNS, SYMBOL_COLUMN, VENDOR_DATE};
    use saigon_data::store::{read_prices, read_risk_free};
    use saigon_data::{DataError, InstrumentOutcome};
    use std::collections::HashSet;
    use std::fs;
    use std::future::Future;

    struct FakeSource {
        failing: HashSet<String>,
    }

    impl FakeSource {
        fn failing(symbols: &[&str]) -> Self {
            Self {
                failing: symbols.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    fn raw_frame(symbol: &str, rows: &[(&str, &str)]) -> saigon_data::Result<DataFrame> {
        let dates: Vec<&str> = rows.iter().map(|(d, _)| *d).collect();
        let closes: Vec<&str> = rows.iter().map(|(_, c)| *c).collect();
        let mut columns = vec![Column::new(VENDOR_DATE.into(), dates)];
        for name in &RAW_COLUMNS[1..RAW_COLUMNS.len() - 1] {
            columns.push(Column::new((*name).into(), closes.clone()));
        }
        columns.push(Column::new(SYMBOL_COLUMN.into(), vec![symbol; rows.len()]));
        Ok(DataFrame::new(columns)?)
    }

    impl HistorySource for FakeSource {
        fn fetch_history(
            &self,
            symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> impl Future<Output = saigon_data::Result<DataFrame>> + Send {
            let result = if self.failing.contains(symbol) {
                Err(DataError::MissingData {
                    symbol: symbol.to_string(),
                    reason: "empty price history".to_string(),
                })
            } else {
                raw_frame(
                    symbol,
                    &[("03/01/2020", "1,200"), ("02/01/2020", "1,100"), ("03/01/2020", "1,200")],
                )
            };
            std::future::ready(result)
        }
    }

    fn config(name: &str, symbols: &[&str]) -> SaigonConfig {
        let dir = std::env::temp_dir().join(format!("saigon-acquire-{name}-{}", std::process::id()));
        let mut config = SaigonConfig::default();
        config.fetch.symbols = symbols.iter().map(|s| s.to_string()).collect();
        config.paths.data_dir = dir;
        config
    }

    #[tokio::test]
    async fn test_tables_written() {
        let config = config("written", &["AAA", "BBB"]);
        let paths = &config.paths;
        fs::create_dir_all(&paths.data_dir).unwrap();
        fs::write(
            paths.data(&paths.risk_free_source),
            "\u{feff}Ngày,Lần cuối\n02/01/2020,2.5%\n03/02/2020,2.6%\n",
        )
        .unwrap();

        let mut seen = Vec::new();
        let summary = acquire(&FakeSource::failing(&[]), &config, |r| seen.push(r.symbol.clone()))
            .await
            .unwrap();

        assert_eq!(seen, ["AAA", "BBB", "VNINDEX"]);
        assert!(summary.universe.failed().is_empty());
        assert_eq!(summary.universe.report.duplicates_removed, 2);

        let prices = read_prices(&paths.data(&paths.universe_clean)).unwrap();
        assert_eq!(prices.len(), 4);
        assert_eq!(prices[0].close, 1100.0);
        let benchmark = read_prices(&paths.data(&paths.benchmark_clean)).unwrap();
        assert!(benchmark.iter().all(|r| r.ticker == "VNINDEX"));
        assert!(paths.data(&paths.universe_raw).is_file());

        let rates = read_risk_free(&paths.data(&paths.risk_free_clean)).unwrap();
        assert_eq!(rates.len(), 2);
        approx::assert_relative_eq!(rates[0].rate, 0.025, epsilon = 1e-12);

        fs::remove_dir_all(&paths.data_dir).ok();
    }

    #[tokio::test]
    async fn test_benchmark_falls_back_to_its_backup() {
        let config = config("benchmark-backup", &["AAA"]);
        let paths = &config.paths;
        fs::create_dir_all(&paths.data_dir).unwrap();
        fs::write(
            paths.data(&paths.benchmark_backup),
            "Ngay,GiaDongCua,GiaDieuChinh,GiaMoCua,GiaCaoNhat,GiaThapNhat,KhoiLuongKhopLenh,symbol\n\
             02/01/2020,960.99,960.99,955.1,962.0,950.3,1000,VNINDEX\n\
             03/01/2020,965.14,965.14,961.0,966.2,958.7,1200,VNINDEX\n",
        )
        .unwrap();

        let summary = acquire(&FakeSource::failing(&["VNINDEX"]), &config, |_| {})
            .await
            .unwrap();

        assert!(matches!(
            summary.benchmark.outcomes[0].outcome,
            InstrumentOutcome::Backup { rows: 2 }
        ));
        assert!(summary.risk_free.is_none());

        fs::remove_dir_all(&paths.data_dir).ok();
    }

    #[tokio::test]
    async fn test_nothing_collected_is_an_error() {
        let mut config = config("nothing", &["AAA"]);
        config.fetch.aggregate.max_failure_ratio = 1.0;
        let err = acquire(&FakeSource::failing(&["AAA"]), &config, |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some("acquire"));

        fs::remove_dir_all(&config.paths.data_dir).ok();
    }
}
