//! Wide date × ticker matrices.
//!
//! A [`Panel`] holds one value per (date, ticker) with `NaN` marking a
//! missing observation. Dates are strictly increasing.

use crate::calendar::{business_days, is_business_day, month_end};
use crate::error::{FactorError, Result};
use chrono::NaiveDate;
use ndarray::{Array2, ArrayView1, Axis};
use polars::prelude::*;
use saigon_data::PriceRecord;
use saigon_data::frame::{date_column, date_values, float_values};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const DATE: &str = "date";
const TICKER: &str = "ticker";
const VALUE: &str = "value";
const MONTH: &str = "month";
const BUSINESS_DAY: &str = "business_day";

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Price field pivoted into a panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    /// Closing price
    #[default]
    Close,
    /// Adjusted closing price
    AdjClose,
    /// Opening price
    Open,
    /// Session high
    High,
    /// Session low
    Low,
    /// Matched volume
    Volume,
}

impl PriceField {
    /// Read this field from a record.
    pub const fn value(self, record: &PriceRecord) -> f64 {
        match self {
            Self::Close => record.close,
            Self::AdjClose => record.adj_close,
            Self::Open => record.open,
            Self::High => record.high,
            Self::Low => record.low,
            Self::Volume => record.volume,
        }
    }
}

/// Dates × tickers matrix with `NaN` for missing values.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Array2<f64>,
}

impl Panel {
    /// Build a panel, checking the shape and that dates strictly increase.
    pub fn new(dates: Vec<NaiveDate>, columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.nrows() != dates.len() {
            return Err(FactorError::DimensionMismatch {
                expected: dates.len(),
                actual: values.nrows(),
            });
        }
        if values.ncols() != columns.len() {
            return Err(FactorError::DimensionMismatch {
                expected: columns.len(),
                actual: values.ncols(),
            });
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FactorError::InvalidParameter(
                "panel dates must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            dates,
            columns,
            values,
        })
    }

    /// Single-column panel.
    pub fn from_series(name: &str, dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        let n = values.len();
        let values = Array2::from_shape_vec((n, 1), values)
            .map_err(|e| FactorError::InvalidParameter(e.to_string()))?;
        Self::new(dates, vec![name.to_string()], values)
    }

    /// Pivot long price records into a panel.
    ///
    /// Rows are the sorted union of dates, columns the sorted tickers. When
    /// a `(ticker, date)` pair repeats, the first record wins.
    pub fn from_records(records: &[PriceRecord], field: PriceField) -> Result<Self> {
        let columns: Vec<String> = records
            .iter()
            .map(|r| r.ticker.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if records.is_empty() {
            return Self::new(Vec::new(), columns, Array2::zeros((0, 0)));
        }

        let long = DataFrame::new(vec![
            date_column(DATE, records.iter().map(|r| Some(r.date)))?,
            Column::new(
                TICKER.into(),
                records.iter().map(|r| r.ticker.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                VALUE.into(),
                records.iter().map(|r| finite(field.value(r))).collect::<Vec<_>>(),
            ),
        ])?;

        let pivots: Vec<Expr> = columns
            .iter()
            .map(|ticker| {
                col(VALUE)
                    .filter(col(TICKER).eq(lit(ticker.as_str())))
                    .first()
                    .alias(ticker.as_str())
            })
            .collect();
        let wide = long
            .lazy()
            .unique_stable(
                Some(vec![TICKER.into(), DATE.into()]),
                UniqueKeepStrategy::First,
            )
            .group_by([col(DATE)])
            .agg(pivots)
            .sort([DATE], SortMultipleOptions::default())
            .collect()?;

        Self::from_frame(&wide, DATE, columns)
    }

    /// Date column followed by one float column per ticker, `NaN` as null.
    fn to_frame(&self) -> Result<DataFrame> {
        let mut frame = vec![date_column(DATE, self.dates.iter().copied().map(Some))?];
        for (j, name) in self.columns.iter().enumerate() {
            let values: Vec<Option<f64>> =
                self.values.column(j).iter().map(|v| finite(*v)).collect();
            frame.push(Column::new(name.as_str().into(), values));
        }
        Ok(DataFrame::new(frame)?)
    }

    /// Panel read back from a frame; null and non-finite cells become `NaN`.
    fn from_frame(df: &DataFrame, dates: &str, columns: Vec<String>) -> Result<Self> {
        let labels = date_values(df.column(dates)?)?
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| FactorError::InvalidParameter(format!("null in {dates} column")))?;
        let cells = columns
            .iter()
            .map(|c| Ok(float_values(df.column(c)?)?))
            .collect::<Result<Vec<_>>>()?;

        let values = Array2::from_shape_fn((labels.len(), columns.len()), |(i, j)| {
            cells[j][i].and_then(finite).unwrap_or(f64::NAN)
        });
        Self::new(labels, columns, values)
    }

    /// Row labels.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Column labels.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Underlying matrix.
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of dates.
    pub fn nrows(&self) -> usize {
        self.dates.len()
    }

    /// Number of tickers.
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Whether the panel has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
    }

    /// Position of a column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// View of one column.
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        self.column_index(name)
            .map(|j| self.values.column(j))
            .ok_or_else(|| FactorError::UnknownTicker(name.to_string()))
    }

    /// Panel restricted to `names`, in the given order.
    pub fn select(&self, names: &[String]) -> Result<Self> {
        let indices = names
            .iter()
            .map(|n| {
                self.column_index(n)
                    .ok_or_else(|| FactorError::UnknownTicker(n.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            dates: self.dates.clone(),
            columns: names.to_vec(),
            values: self.values.select(Axis(1), &indices),
        })
    }

    /// Panel restricted to the rows whose date is in `dates`.
    pub fn select_dates(&self, dates: &[NaiveDate]) -> Self {
        let wanted: BTreeSet<&NaiveDate> = dates.iter().collect();
        self.filter_rows(|i| wanted.contains(&self.dates[i]))
    }

    fn filter_rows<F: Fn(usize) -> bool>(&self, keep: F) -> Self {
        let rows: Vec<usize> = (0..self.nrows()).filter(|&i| keep(i)).collect();
        Self {
            dates: rows.iter().map(|&i| self.dates[i]).collect(),
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), &rows),
        }
    }

    /// First date with a finite value, per column.
    pub fn first_valid_dates(&self) -> Vec<(String, Option<NaiveDate>)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let first = self
                    .values
                    .column(j)
                    .iter()
                    .position(|v| v.is_finite())
                    .map(|i| self.dates[i]);
                (name.clone(), first)
            })
            .collect()
    }

    /// Missing values per column, largest count first (ties keep column order).
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = self
            .columns
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let missing = self.values.column(j).iter().filter(|v| !v.is_finite()).count();
                (name.clone(), missing)
            })
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }

    /// Last finite value of each column within each calendar month, labelled
    /// with the month-end date.
    pub fn resample_month_end_last(&self) -> Result<Self> {
        let mut frame = self.to_frame()?;
        frame.with_column(date_column(
            MONTH,
            self.dates.iter().map(|d| Some(month_end(*d))),
        )?)?;

        let lasts: Vec<Expr> = self
            .columns
            .iter()
            .map(|c| col(c.as_str()).drop_nulls().last())
            .collect();
        let monthly = frame
            .lazy()
            .group_by_stable([col(MONTH)])
            .agg(lasts)
            .collect()?;

        Self::from_frame(&monthly, MONTH, self.columns.clone())
    }

    /// Percentage change between consecutive rows. The first row is
    /// removed; a change is `NaN` when either side is missing or the
    /// previous value is zero.
    pub fn pct_change(&self) -> Result<Self> {
        let changes: Vec<Expr> = self
            .columns
            .iter()
            .map(|c| {
                (col(c.as_str()) / col(c.as_str()).shift(lit(1)) - lit(1.0)).alias(c.as_str())
            })
            .collect();
        let frame = self
            .to_frame()?
            .lazy()
            .with_columns(changes)
            .slice(1, IdxSize::MAX)
            .collect()?;

        Self::from_frame(&frame, DATE, self.columns.clone())
    }

    /// Rows where every column is finite.
    pub fn drop_incomplete_rows(&self) -> Result<Self> {
        let complete = self.to_frame()?.lazy().drop_nulls(None).collect()?;
        Self::from_frame(&complete, DATE, self.columns.clone())
    }

    /// Each column divided by its first finite value.
    pub fn normalized_to_first(&self) -> Self {
        let mut values = self.values.clone();
        for mut column in values.columns_mut() {
            let base = column.iter().copied().find(|v| v.is_finite());
            match base {
                Some(base) if base != 0.0 => column.mapv_inplace(|v| v / base),
                _ => column.fill(f64::NAN),
            }
        }
        Self {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values,
        }
    }

    /// Reindex to every business day between the first and last date,
    /// carrying the latest observation forward. Weekend rows are dropped
    /// once their values have been carried.
    pub fn reindex_business_days(&self) -> Result<Self> {
        let (Some(first), Some(last)) = (self.dates.first(), self.dates.last()) else {
            return Ok(self.clone());
        };
        let timeline: Vec<NaiveDate> = business_days(*first, *last)
            .into_iter()
            .chain(self.dates.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let spine = DataFrame::new(vec![
            date_column(DATE, timeline.iter().copied().map(Some))?,
            Column::new(
                BUSINESS_DAY.into(),
                timeline.iter().map(|d| is_business_day(*d)).collect::<Vec<_>>(),
            ),
        ])?;

        let carried: Vec<Expr> = self
            .columns
            .iter()
            .map(|c| col(c.as_str()).fill_null_with_strategy(FillNullStrategy::Forward(None)))
            .collect();
        let daily = spine
            .lazy()
            .join(
                self.to_frame()?.lazy(),
                [col(DATE)],
                [col(DATE)],
                JoinArgs::new(JoinType::Left),
            )
            .sort([DATE], SortMultipleOptions::default())
            .with_columns(carried)
            .filter(col(BUSINESS_DAY))
            .collect()?;

        Self::from_frame(&daily, DATE, self.columns.clone())
    }

    /// Finite `(date, value)` pairs of one column.
    pub fn column_series(&self, name: &str) -> Result<(Vec<NaiveDate>, Vec<f64>)> {
        let column = self.column(name)?;
        Ok(self
            .dates
            .iter()
            .zip(column.iter())
            .filter(|(_, v)| v.is_finite())
            .map(|(d, v)| (*d, *v))
            .unzip())
    }
}
