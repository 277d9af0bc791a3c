//! Typed access to polars columns.
//!
//! Dates are stored as polars `Date` (days since the Unix epoch); the
//! helpers here convert them to and from [`NaiveDate`].

use crate::error::Result;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

/// Days between 0001-01-01 and 1970-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Build a `Date` column; `None` becomes null.
pub fn date_column<I>(name: &str, dates: I) -> Result<Column>
where
    I: IntoIterator<Item = Option<NaiveDate>>,
{
    let days: Vec<Option<i32>> = dates
        .into_iter()
        .map(|d| d.map(|d| d.num_days_from_ce() - EPOCH_DAYS_FROM_CE))
        .collect();
    Ok(Column::new(name.into(), days).cast(&DataType::Date)?)
}

/// Read a `Date` column.
pub fn date_values(column: &Column) -> Result<Vec<Option<NaiveDate>>> {
    let days = column.cast(&DataType::Int32)?;
    Ok(days
        .i32()?
        .into_iter()
        .map(|d| d.and_then(|d| NaiveDate::from_num_days_from_ce_opt(d + EPOCH_DAYS_FROM_CE)))
        .collect())
}

/// Read a column as floats; non-float columns are cast first.
pub fn float_values(column: &Column) -> Result<Vec<Option<f64>>> {
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

/// Read a column as text cells; non-string columns are cast first.
pub fn text_values(column: &Column) -> Result<Vec<Option<String>>> {
    let cast = column.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dates_survive_the_epoch_offset() {
        let dates = vec![
            NaiveDate::from_ymd_opt(1970, 1, 1),
            None,
            NaiveDate::from_ymd_opt(2025, 11, 21),
            NaiveDate::from_ymd_opt(1969, 12, 31),
        ];
        let column = date_column("date", dates.clone()).unwrap();
        assert_eq!(column.dtype(), &DataType::Date);
        assert_eq!(column.null_count(), 1);
        assert_eq!(date_values(&column).unwrap(), dates);

        let days = column.cast(&DataType::Int32).unwrap();
        assert_eq!(days.i32().unwrap().get(0), Some(0));
        assert_eq!(days.i32().unwrap().get(3), Some(-1));
    }

    #[test]
    fn test_text_cast_to_floats() {
        let column = Column::new("close".into(), vec![Some("1.5"), None, Some("x")]);
        assert_eq!(float_values(&column).unwrap(), vec![Some(1.5), None, None]);
    }
}
