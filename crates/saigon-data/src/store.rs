//! CSV persistence for raw and cleaned tables.
//!
//! Raw vendor tables are polars string frames; cleaned tables are typed
//! records written through `csv` + `serde`. Every write goes to a sibling
//! temporary file that is renamed over the destination once complete, so a
//! reader never observes a half-written table.

use crate::error::{DataError, Result};
use crate::records::{PriceRecord, RiskFreeRecord};
use polars::prelude::*;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write `path` atomically: `write` fills a temporary sibling file which then
/// replaces the destination.
///
/// Parent directories are created as needed. On failure the temporary file is
/// removed and the destination is left untouched.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    let written: Result<()> = File::create(&tmp)
        .map_err(DataError::from)
        .and_then(|mut file| {
            write(&mut file)?;
            file.sync_all()?;
            Ok(())
        });

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), "table written");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("table"));
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(DataError::NotFound {
            path: path.display().to_string(),
        })
    }
}

/// Write a polars frame as CSV with a header row.
pub fn write_frame(df: &mut DataFrame, path: &Path) -> Result<()> {
    write_atomic(path, |file| {
        CsvWriter::new(file).include_header(true).finish(df)?;
        Ok(())
    })
}

/// Read a CSV table keeping every column as text.
///
/// Used for raw vendor tables, backups and the risk-free source, whose
/// cells may carry localized numbers or percent signs.
pub fn read_string_table(path: &Path) -> Result<DataFrame> {
    ensure_exists(path)?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Serialize records as CSV, one row per record, header from field names.
pub fn write_records<T: Serialize>(records: &[T], path: &Path) -> Result<()> {
    write_atomic(path, |file| {
        let mut writer = csv::Writer::from_writer(file);
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    })
}

/// Deserialize every row of a CSV table.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    ensure_exists(path)?;
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(records)
}

/// Persist a cleaned price table (`date,ticker,close,adj_close,open,high,low,volume`).
pub fn write_prices(records: &[PriceRecord], path: &Path) -> Result<()> {
    write_records(records, path)
}

/// Load a cleaned price table.
pub fn read_prices(path: &Path) -> Result<Vec<PriceRecord>> {
    read_records(path)
}

/// Persist a cleaned risk-free table (`date,rate`).
pub fn write_risk_free(records: &[RiskFreeRecord], path: &Path) -> Result<()> {
    write_records(records, path)
}

/// Load a cleaned risk-free table.
pub fn read_risk_free(path: &Path) -> Result<Vec<RiskFreeRecord>> {
    read_records(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("saigon-store-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = scratch_dir("parents");
        let path = dir.join("nested").join("table.csv");
        write_atomic(&path, |file| {
            use std::io::Write;
            file.write_all(b"a,b\n1,2\n")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n1,2\n");
        assert!(!temp_path(&path).exists());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_failed_write_keeps_destination() {
        let dir = scratch_dir("failed");
        let path = dir.join("table.csv");
        fs::create_dir_all(&dir).unwrap();
        fs::write(&path, "old").unwrap();

        let result = write_atomic(&path, |_| Err(DataError::Parse("boom".to_string())));
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
        assert!(!temp_path(&path).exists());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_price_table_header() {
        let dir = scratch_dir("header");
        let path = dir.join("prices.csv");
        let records = vec![PriceRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            ticker: "FPT".to_string(),
            close: 101.5,
            adj_close: 101.5,
            open: 100.0,
            high: 102.0,
            low: 99.5,
            volume: 1_500_000.0,
        }];
        write_prices(&records, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("date,ticker,close,adj_close,open,high,low,volume")
        );
        assert!(lines.next().unwrap().starts_with("2024-03-01,FPT,"));
        assert_eq!(read_prices(&path).unwrap(), records);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_string_table_keeps_text() {
        let dir = scratch_dir("strings");
        let path = dir.join("raw.csv");
        fs::create_dir_all(&dir).unwrap();
        fs::write(&path, "Ngay,GiaDongCua,symbol\n02/01/2020,\"1,250.5\",VJC\n").unwrap();

        let df = read_string_table(&path).unwrap();
        let close = df.column("GiaDongCua").unwrap().str().unwrap();
        assert_eq!(close.get(0), Some("1,250.5"));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let result = read_prices(Path::new("/nonexistent/saigon/prices.csv"));
        assert!(matches!(result, Err(DataError::NotFound { .. })));
    }
}
