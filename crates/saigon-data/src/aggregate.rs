//! Collection of raw price histories for a list of instruments.
//!
//! The aggregator drives a [`HistorySource`] over an ordered symbol list,
//! records what happened to every instrument and substitutes rows from a
//! backup table when a fetch fails. Only recoverable failures (see
//! [`DataError::is_recoverable`]) are substituted; any other error aborts
//! the collection.

use crate::cafef::CafefClient;
use crate::error::{DataError, Result};
use crate::records::{RAW_COLUMNS, SYMBOL_COLUMN};
use crate::store::read_string_table;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use tracing::{info, warn};

/// Anything able to return the raw price history of one symbol.
pub trait HistorySource {
    /// Fetch the raw history of `symbol` between `start` and `end` inclusive.
    fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<DataFrame>> + Send;
}

impl HistorySource for CafefClient {
    fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<DataFrame>> + Send {
        Self::fetch_history(self, symbol, start, end)
    }
}

/// What to do when an instrument cannot be fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failure. The whole backup table, when present,
    /// replaces that instrument and every later one.
    FailFast,
    /// Keep going, filling each failed instrument from its backup rows, and
    /// abort afterwards if too many instruments ended without data.
    #[default]
    Continue,
}

/// Aggregation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    /// Failure handling.
    pub policy: FailurePolicy,
    /// Largest tolerated share of failed instruments under
    /// [`FailurePolicy::Continue`], in `[0, 1]`.
    pub max_failure_ratio: f64,
    /// Number of requests kept in flight. Results keep the input order.
    pub concurrency: usize,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::default(),
            max_failure_ratio: 0.5,
            concurrency: 1,
        }
    }
}

/// Result of collecting one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentOutcome {
    /// Rows came from the vendor.
    Fetched {
        /// Row count
        rows: usize,
    },
    /// The fetch failed and rows came from the backup table.
    Backup {
        /// Row count
        rows: usize,
    },
    /// No data for this instrument.
    Failed {
        /// Why the fetch and the backup both failed
        reason: String,
    },
}

impl InstrumentOutcome {
    /// Whether the instrument ended without any rows.
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Outcome for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentReport {
    /// Symbol
    pub symbol: String,
    /// What happened
    pub outcome: InstrumentOutcome,
}

/// Concatenated raw rows plus the per-instrument outcomes.
#[derive(Debug, Clone)]
pub struct RawCollection {
    /// Raw table in the vendor schema (`RAW_COLUMNS`), all text.
    pub frame: DataFrame,
    /// One entry per attempted instrument, in input order.
    pub outcomes: Vec<InstrumentReport>,
}

impl RawCollection {
    /// Number of instruments that ended without data.
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|r| r.outcome.is_failed()).count()
    }

    /// Number of instruments filled from the backup.
    pub fn backup_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|r| matches!(r.outcome, InstrumentOutcome::Backup { .. }))
            .count()
    }
}

/// Drives a [`HistorySource`] over a symbol list.
#[derive(Debug)]
pub struct Aggregator<'a, S> {
    source: &'a S,
    config: AggregateConfig,
    backup: Option<&'a Path>,
}

impl<'a, S: HistorySource + Sync> Aggregator<'a, S> {
    /// Create an aggregator without backup table.
    pub const fn new(source: &'a S, config: AggregateConfig) -> Self {
        Self {
            source,
            config,
            backup: None,
        }
    }

    /// Use the raw table at `path` as fallback for failed instruments.
    pub const fn with_backup(mut self, path: &'a Path) -> Self {
        self.backup = Some(path);
        self
    }

    /// Collect every symbol.
    pub async fn collect(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawCollection> {
        self.collect_with_progress(symbols, start, end, |_| {}).await
    }

    /// Collect every symbol, calling `on_progress` after each instrument.
    pub async fn collect_with_progress<F>(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        mut on_progress: F,
    ) -> Result<RawCollection>
    where
        F: FnMut(&InstrumentReport),
    {
        let source = self.source;
        let mut fetches = stream::iter(symbols.iter())
            .map(|symbol| async move {
                let result = source.fetch_history(symbol, start, end).await;
                (symbol, result)
            })
            .buffered(self.config.concurrency.max(1));

        let mut backup = BackupTable::new(self.backup);
        let mut frames = Vec::new();
        let mut outcomes = Vec::with_capacity(symbols.len());

        while let Some((symbol, result)) = fetches.next().await {
            let result = match result {
                Err(e) if !e.is_recoverable() => {
                    warn!(symbol = %symbol, error = %e, "fatal fetch error, aborting the collection");
                    return Err(e);
                }
                result => result.and_then(conform_raw),
            };
            let error = match result {
                Ok(df) => {
                    let report = InstrumentReport {
                        symbol: symbol.clone(),
                        outcome: InstrumentOutcome::Fetched { rows: df.height() },
                    };
                    on_progress(&report);
                    outcomes.push(report);
                    frames.push(df);
                    continue;
                }
                Err(e) => e,
            };

            warn!(symbol = %symbol, error = %error, "fetch failed");

            let outcome = match self.config.policy {
                FailurePolicy::FailFast => match backup.full()? {
                    Some(df) => {
                        info!(rows = df.height(), "substituting the full backup table");
                        let rows = df.height();
                        frames.push(df);
                        InstrumentOutcome::Backup { rows }
                    }
                    None => InstrumentOutcome::Failed {
                        reason: error.to_string(),
                    },
                },
                FailurePolicy::Continue => match backup.rows_for(symbol) {
                    Ok(Some(df)) => {
                        let rows = df.height();
                        frames.push(df);
                        InstrumentOutcome::Backup { rows }
                    }
                    Ok(None) => InstrumentOutcome::Failed {
                        reason: error.to_string(),
                    },
                    Err(backup_error) => {
                        warn!(symbol = %symbol, error = %backup_error, "backup table unreadable");
                        InstrumentOutcome::Failed {
                            reason: format!("{error}; backup unreadable: {backup_error}"),
                        }
                    }
                },
            };

            let report = InstrumentReport {
                symbol: symbol.clone(),
                outcome,
            };
            on_progress(&report);
            outcomes.push(report);

            if self.config.policy == FailurePolicy::FailFast {
                break;
            }
        }

        let collection = RawCollection {
            frame: concat_raw(frames)?,
            outcomes,
        };

        let failed = collection.failed_count();
        info!(
            instruments = collection.outcomes.len(),
            failed,
            from_backup = collection.backup_count(),
            rows = collection.frame.height(),
            "raw collection finished"
        );

        if self.config.policy == FailurePolicy::Continue && !symbols.is_empty() {
            let ratio = failed as f64 / symbols.len() as f64;
            if ratio > self.config.max_failure_ratio {
                return Err(DataError::TooManyFailures {
                    failed,
                    total: symbols.len(),
                    limit: self.config.max_failure_ratio * 100.0,
                });
            }
        }

        Ok(collection)
    }
}

/// Backup table, loaded on first use.
struct BackupTable<'a> {
    path: Option<&'a Path>,
    frame: Option<DataFrame>,
}

impl<'a> BackupTable<'a> {
    const fn new(path: Option<&'a Path>) -> Self {
        Self { path, frame: None }
    }

    fn load(&mut self) -> Result<Option<&DataFrame>> {
        let Some(path) = self.path else {
            return Ok(None);
        };
        if self.frame.is_none() {
            if !path.is_file() {
                warn!(path = %path.display(), "no backup table available");
                self.path = None;
                return Ok(None);
            }
            self.frame = Some(conform_raw(read_string_table(path)?)?);
        }
        Ok(self.frame.as_ref())
    }

    fn full(&mut self) -> Result<Option<DataFrame>> {
        Ok(self.load()?.cloned())
    }

    fn rows_for(&mut self, symbol: &str) -> Result<Option<DataFrame>> {
        let Some(frame) = self.load()? else {
            return Ok(None);
        };
        let rows = frame
            .clone()
            .lazy()
            .filter(col(SYMBOL_COLUMN).eq(lit(symbol)))
            .collect()?;
        if rows.height() == 0 {
            warn!(symbol, "backup table has no rows for instrument");
            Ok(None)
        } else {
            Ok(Some(rows))
        }
    }
}

/// Reorder `df` to the raw vendor schema, casting to text and adding absent
/// columns as nulls.
pub fn conform_raw(df: DataFrame) -> Result<DataFrame> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    if !RAW_COLUMNS
        .iter()
        .any(|name| present.iter().any(|p| p == name))
    {
        return Err(DataError::MissingColumn {
            table: "raw price table".to_string(),
            column: RAW_COLUMNS[0].to_string(),
        });
    }

    let exprs: Vec<Expr> = RAW_COLUMNS
        .iter()
        .map(|name| {
            if present.iter().any(|p| p == name) {
                col(*name).cast(DataType::String)
            } else {
                lit(NULL).cast(DataType::String).alias(*name)
            }
        })
        .collect();

    Ok(df.lazy().select(exprs).collect()?)
}

fn empty_raw() -> Result<DataFrame> {
    let columns = RAW_COLUMNS
        .iter()
        .map(|name| Column::new((*name).into(), Vec::<String>::new()))
        .collect();
    Ok(DataFrame::new(columns)?)
}

fn concat_raw(frames: Vec<DataFrame>) -> Result<DataFrame> {
    if frames.is_empty() {
        return empty_raw();
    }
    let lazy: Vec<LazyFrame> = frames.into_iter().map(DataFrame::lazy).collect();
    Ok(concat(lazy, UnionArgs::default())?.collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{VENDOR_CLOSE, VENDOR_DATE};
    use std::collections::HashSet;
    use std::fs;
    use std::path::PathBuf;

    struct FakeSource {
        failing: HashSet<String>,
        rejected: HashSet<String>,
    }

    impl FakeSource {
        fn failing(symbols: &[&str]) -> Self {
            Self {
                failing: symbols.iter().map(|s| s.to_string()).collect(),
                rejected: HashSet::new(),
            }
        }

        fn rejecting(mut self, symbols: &[&str]) -> Self {
            self.rejected = symbols.iter().map(|s| s.to_string()).collect();
            self
        }
    }

    fn raw_frame(symbol: &str, closes: &[&str]) -> DataFrame {
        let dates: Vec<String> = (0..closes.len())
            .map(|i| format!("{:02}/01/2020", i + 2))
            .collect();
        DataFrame::new(vec![
            Column::new(VENDOR_DATE.into(), dates),
            Column::new(VENDOR_CLOSE.into(), closes.to_vec()),
            Column::new(SYMBOL_COLUMN.into(), vec![symbol; closes.len()]),
        ])
        .unwrap()
    }

    impl HistorySource for FakeSource {
        fn fetch_history(
            &self,
            symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> impl Future<Output = Result<DataFrame>> + Send {
            let result = if self.rejected.contains(symbol) {
                Err(DataError::InvalidSymbol(symbol.to_string()))
            } else if self.failing.contains(symbol) {
                Err(DataError::MissingData {
                    symbol: symbol.to_string(),
                    reason: "empty price history".to_string(),
                })
            } else {
                Ok(raw_frame(symbol, &["10", "11", "12"]))
            };
            std::future::ready(result)
        }
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn range() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
        )
    }

    fn backup_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("saigon-agg-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("backup.csv");
        fs::write(
            &path,
            "Ngay,GiaDongCua,symbol\n02/01/2020,20,BBB\n03/01/2020,21,BBB\n02/01/2020,30,CCC\n",
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_all_fetched_in_order() {
        let source = FakeSource::failing(&[]);
        let (start, end) = range();
        let collection = Aggregator::new(&source, AggregateConfig::default())
            .collect(&symbols(&["AAA", "BBB"]), start, end)
            .await
            .unwrap();

        assert_eq!(collection.frame.height(), 6);
        assert_eq!(collection.frame.width(), RAW_COLUMNS.len());
        assert_eq!(collection.outcomes[0].symbol, "AAA");
        assert_eq!(
            collection.outcomes[1].outcome,
            InstrumentOutcome::Fetched { rows: 3 }
        );
    }

    #[tokio::test]
    async fn test_continue_fills_from_backup() {
        let source = FakeSource::failing(&["BBB"]);
        let backup = backup_file("continue");
        let (start, end) = range();
        let collection = Aggregator::new(&source, AggregateConfig::default())
            .with_backup(&backup)
            .collect(&symbols(&["AAA", "BBB", "DDD"]), start, end)
            .await
            .unwrap();

        assert_eq!(collection.outcomes.len(), 3);
        assert_eq!(
            collection.outcomes[1].outcome,
            InstrumentOutcome::Backup { rows: 2 }
        );
        assert_eq!(collection.frame.height(), 3 + 2 + 3);
        fs::remove_dir_all(backup.parent().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_fail_fast_substitutes_whole_backup() {
        let source = FakeSource::failing(&["BBB"]);
        let backup = backup_file("failfast");
        let (start, end) = range();
        let config = AggregateConfig {
            policy: FailurePolicy::FailFast,
            ..AggregateConfig::default()
        };
        let collection = Aggregator::new(&source, config)
            .with_backup(&backup)
            .collect(&symbols(&["AAA", "BBB", "DDD"]), start, end)
            .await
            .unwrap();

        assert_eq!(collection.outcomes.len(), 2);
        assert_eq!(
            collection.outcomes[1].outcome,
            InstrumentOutcome::Backup { rows: 3 }
        );
        assert_eq!(collection.frame.height(), 3 + 3);
        fs::remove_dir_all(backup.parent().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_fail_fast_without_backup_stops() {
        let source = FakeSource::failing(&["AAA"]);
        let (start, end) = range();
        let config = AggregateConfig {
            policy: FailurePolicy::FailFast,
            ..AggregateConfig::default()
        };
        let collection = Aggregator::new(&source, config)
            .collect(&symbols(&["AAA", "BBB"]), start, end)
            .await
            .unwrap();

        assert_eq!(collection.outcomes.len(), 1);
        assert!(collection.outcomes[0].outcome.is_failed());
        assert_eq!(collection.frame.height(), 0);
        assert_eq!(collection.frame.width(), RAW_COLUMNS.len());
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_despite_backup() {
        let source = FakeSource::failing(&[]).rejecting(&["BBB"]);
        let backup = backup_file("fatal");
        let (start, end) = range();
        let result = Aggregator::new(&source, AggregateConfig::default())
            .with_backup(&backup)
            .collect(&symbols(&["AAA", "BBB", "DDD"]), start, end)
            .await;

        assert!(matches!(result, Err(DataError::InvalidSymbol(ref s)) if s == "BBB"));
        fs::remove_dir_all(backup.parent().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_unreadable_backup_marks_instrument_failed() {
        let source = FakeSource::failing(&["BBB"]);
        let backup = backup_file("unreadable");
        fs::write(&backup, "foo,bar\n1,2\n").unwrap();
        let (start, end) = range();
        let collection = Aggregator::new(&source, AggregateConfig::default())
            .with_backup(&backup)
            .collect(&symbols(&["AAA", "BBB", "DDD"]), start, end)
            .await
            .unwrap();

        assert_eq!(collection.outcomes.len(), 3);
        match &collection.outcomes[1].outcome {
            InstrumentOutcome::Failed { reason } => assert!(reason.contains("backup unreadable")),
            other => panic!("expected a failed instrument, got {other:?}"),
        }
        assert_eq!(collection.frame.height(), 3 + 3);
        fs::remove_dir_all(backup.parent().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_too_many_failures() {
        let source = FakeSource::failing(&["AAA", "BBB"]);
        let (start, end) = range();
        let result = Aggregator::new(&source, AggregateConfig::default())
            .collect(&symbols(&["AAA", "BBB", "CCC"]), start, end)
            .await;
        assert!(matches!(
            result,
            Err(DataError::TooManyFailures {
                failed: 2,
                total: 3,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_concurrency_keeps_order_and_reports_progress() {
        let source = FakeSource::failing(&[]);
        let (start, end) = range();
        let config = AggregateConfig {
            concurrency: 4,
            ..AggregateConfig::default()
        };
        let list = symbols(&["A1", "A2", "A3", "A4", "A5"]);
        let mut seen = Vec::new();
        let collection = Aggregator::new(&source, config)
            .collect_with_progress(&list, start, end, |report| seen.push(report.symbol.clone()))
            .await
            .unwrap();

        assert_eq!(seen, list);
        let order: Vec<&str> = collection.outcomes.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, ["A1", "A2", "A3", "A4", "A5"]);
    }

    #[test]
    fn test_conform_raw_adds_missing_columns() {
        let df = conform_raw(raw_frame("AAA", &["1"])).unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, RAW_COLUMNS);
        assert_eq!(df.column("GiaMoCua").unwrap().null_count(), 1);
    }
}
