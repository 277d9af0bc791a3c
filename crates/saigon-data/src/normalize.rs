//! Conversion of raw vendor tables into typed, gap-free records.

use crate::error::{DataError, Result};
use crate::frame::{date_column, date_values, float_values, text_values};
use crate::records::{PriceRecord, RENAME_MAP, RiskFreeRecord};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Risk-free source column holding the observation date.
pub const RISK_FREE_DATE: &str = "Ngày";
/// Risk-free source column holding the closing yield, in percent.
pub const RISK_FREE_RATE: &str = "Lần cuối";

const DAY_FIRST_FORMATS: [&str; 4] = ["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"];

/// Scope of forward-filling and sorting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// Each ticker is filled independently (multi-instrument tables).
    #[default]
    PerInstrument,
    /// The table is one series (benchmark tables).
    Global,
}

/// Bookkeeping of one normalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    /// Rows in the input table
    pub rows_in: usize,
    /// Rows dropped because their date was missing or unparseable
    pub dropped_missing_date: usize,
    /// Duplicate `(ticker, date)` rows removed
    pub duplicates_removed: usize,
    /// Cells filled from the previous row of the same group
    pub values_filled: usize,
    /// Rows still incomplete after filling, dropped
    pub dropped_incomplete: usize,
    /// Rows in the output
    pub rows_out: usize,
}

/// Normalized records and the report describing how they were obtained.
#[derive(Debug, Clone)]
pub struct Normalized<T> {
    /// Output rows
    pub records: Vec<T>,
    /// Cleaning statistics
    pub report: NormalizeReport,
}

/// Parse a vendor number: thousands separators and percent signs are
/// stripped, surrounding whitespace ignored.
///
/// Returns `None` for empty or unparseable text.
pub fn parse_localized_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '%')
        .collect();
    let value = cleaned.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

/// Parse a date written day-first (`DD/MM/YYYY`, `DD-MM-YYYY`, `DD.MM.YYYY`)
/// or as ISO `YYYY-MM-DD`, optionally followed by a time of day.
pub fn parse_day_first_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    DAY_FIRST_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Strip byte-order marks and whitespace from a header cell.
fn clean_header(name: &str) -> &str {
    name.trim_start_matches('\u{feff}').trim()
}

/// Locate a column by any of its accepted names, ignoring BOMs.
fn find_column<'a>(df: &'a DataFrame, names: &[&str]) -> Option<&'a Column> {
    df.get_columns()
        .iter()
        .find(|c| names.contains(&clean_header(c.name().as_str())))
}

fn required_column<'a>(df: &'a DataFrame, table: &str, canonical: &str) -> Result<&'a Column> {
    let vendor = vendor_name(canonical);
    find_column(df, &[vendor, canonical]).ok_or_else(|| DataError::MissingColumn {
        table: table.to_string(),
        column: vendor.to_string(),
    })
}

fn vendor_name(canonical: &str) -> &'static str {
    RENAME_MAP
        .iter()
        .find(|(_, c)| *c == canonical)
        .map_or("", |(vendor, _)| vendor)
}

const DATE: &str = "date";
const TICKER: &str = "ticker";
const RATE: &str = "rate";

/// Canonical numeric fields, in output order.
const NUMERIC_FIELDS: [&str; 6] = ["close", "adj_close", "open", "high", "low", "volume"];

fn parsed_dates(column: &Column) -> Result<Column> {
    let dates = text_values(column)?;
    date_column(
        DATE,
        dates.iter().map(|d| d.as_deref().and_then(parse_day_first_date)),
    )
}

fn parsed_numbers(name: &str, column: &Column, scale: f64) -> Result<Column> {
    let values: Vec<Option<f64>> = text_values(column)?
        .iter()
        .map(|v| v.as_deref().and_then(parse_localized_number).map(|v| v / scale))
        .collect();
    Ok(Column::new(name.into(), values))
}

/// Vendor table reduced to the canonical, typed price columns.
fn typed_prices(df: &DataFrame) -> Result<DataFrame> {
    let table = "price table";
    let dates = parsed_dates(required_column(df, table, DATE)?)?;
    let tickers: Vec<String> = text_values(required_column(df, table, TICKER)?)?
        .into_iter()
        .map(|t| t.unwrap_or_default().trim().to_string())
        .collect();

    let mut columns = vec![dates, Column::new(TICKER.into(), tickers)];
    for field in NUMERIC_FIELDS {
        columns.push(parsed_numbers(field, required_column(df, table, field)?, 1.0)?);
    }
    Ok(DataFrame::new(columns)?)
}

fn numeric_nulls(df: &DataFrame) -> Result<usize> {
    NUMERIC_FIELDS
        .iter()
        .map(|f| Ok(df.column(f)?.null_count()))
        .sum()
}

/// Normalize a raw price table into [`PriceRecord`]s.
///
/// Columns are recognized under their vendor or canonical names; any other
/// column is ignored. Rows without a date are dropped, duplicate
/// `(ticker, date)` pairs keep their first occurrence, rows are sorted by
/// date within each group, numeric gaps are forward-filled within the group
/// and rows still incomplete afterwards (the leading edge) are dropped.
pub fn normalize_prices(df: &DataFrame, grouping: Grouping) -> Result<Normalized<PriceRecord>> {
    let typed = typed_prices(df)?;
    let mut report = NormalizeReport {
        rows_in: typed.height(),
        dropped_missing_date: typed.column(DATE)?.null_count(),
        ..NormalizeReport::default()
    };

    let sort_options = SortMultipleOptions::default().with_maintain_order(true);
    let deduped = typed
        .lazy()
        .filter(col(DATE).is_not_null())
        .unique_stable(
            Some(vec![TICKER.into(), DATE.into()]),
            UniqueKeepStrategy::First,
        );
    let sorted = match grouping {
        Grouping::PerInstrument => deduped.sort([TICKER, DATE], sort_options),
        Grouping::Global => deduped.sort([DATE], sort_options),
    }
    .collect()?;
    report.duplicates_removed = report.rows_in - report.dropped_missing_date - sorted.height();

    let fills: Vec<Expr> = NUMERIC_FIELDS
        .iter()
        .map(|f| {
            let filled = col(*f).fill_null_with_strategy(FillNullStrategy::Forward(None));
            match grouping {
                Grouping::PerInstrument => filled.over([col(TICKER)]),
                Grouping::Global => filled,
            }
        })
        .collect();
    let gaps = numeric_nulls(&sorted)?;
    let filled = sorted.lazy().with_columns(fills).collect()?;
    report.values_filled = gaps - numeric_nulls(&filled)?;

    let before = filled.height();
    let complete = filled.lazy().drop_nulls(None).collect()?;
    report.dropped_incomplete = before - complete.height();

    let records = price_records(&complete)?;
    report.rows_out = records.len();
    info!(
        rows_in = report.rows_in,
        rows_out = report.rows_out,
        filled = report.values_filled,
        duplicates = report.duplicates_removed,
        "price table normalized"
    );

    Ok(Normalized { records, report })
}

/// Rows of a complete typed price frame.
fn price_records(df: &DataFrame) -> Result<Vec<PriceRecord>> {
    let dates = date_values(df.column(DATE)?)?;
    let tickers = text_values(df.column(TICKER)?)?;
    let numeric = NUMERIC_FIELDS
        .iter()
        .map(|f| float_values(df.column(f)?))
        .collect::<Result<Vec<_>>>()?;

    let mut records = Vec::with_capacity(df.height());
    for (row, (date, ticker)) in dates.into_iter().zip(tickers).enumerate() {
        let values: Option<Vec<f64>> = numeric.iter().map(|cells| cells[row]).collect();
        if let (Some(date), Some(ticker), Some(&[close, adj_close, open, high, low, volume])) =
            (date, ticker, values.as_deref())
        {
            records.push(PriceRecord {
                date,
                ticker,
                close,
                adj_close,
                open,
                high,
                low,
                volume,
            });
        }
    }
    Ok(records)
}

/// Normalize a risk-free source table (`Ngày`, `Lần cuối` in percent).
///
/// Headers are matched after stripping byte-order marks. Tables already
/// in the cleaned schema (`date`, `rate` as a decimal) are accepted too.
/// Repeated dates keep their first occurrence.
pub fn normalize_risk_free(df: &DataFrame) -> Result<Normalized<RiskFreeRecord>> {
    let table = "risk-free table";
    let date_col = find_column(df, &[RISK_FREE_DATE, DATE]).ok_or_else(|| DataError::MissingColumn {
        table: table.to_string(),
        column: RISK_FREE_DATE.to_string(),
    })?;
    let (rate_col, percent) = match find_column(df, &[RISK_FREE_RATE]) {
        Some(column) => (column, true),
        None => (
            find_column(df, &[RATE]).ok_or_else(|| DataError::MissingColumn {
                table: table.to_string(),
                column: RISK_FREE_RATE.to_string(),
            })?,
            false,
        ),
    };
    let scale = if percent { 100.0 } else { 1.0 };

    let typed = DataFrame::new(vec![parsed_dates(date_col)?, parsed_numbers(RATE, rate_col, scale)?])?;
    let mut report = NormalizeReport {
        rows_in: typed.height(),
        dropped_missing_date: typed.column(DATE)?.null_count(),
        ..NormalizeReport::default()
    };

    let dated = typed.lazy().filter(col(DATE).is_not_null()).collect()?;
    let priced = dated.clone().lazy().filter(col(RATE).is_not_null()).collect()?;
    report.dropped_incomplete = dated.height() - priced.height();

    let kept = priced.height();
    let cleaned = priced
        .lazy()
        .unique_stable(Some(vec![DATE.into()]), UniqueKeepStrategy::First)
        .sort([DATE], SortMultipleOptions::default().with_maintain_order(true))
        .collect()?;
    report.duplicates_removed = kept - cleaned.height();

    let records: Vec<RiskFreeRecord> = date_values(cleaned.column(DATE)?)?
        .into_iter()
        .zip(float_values(cleaned.column(RATE)?)?)
        .filter_map(|(date, rate)| Some(RiskFreeRecord { date: date?, rate: rate? }))
        .collect();
    report.rows_out = records.len();

    debug!(rows = report.rows_out, "risk-free table normalized");
    Ok(Normalized { records, report })
}
