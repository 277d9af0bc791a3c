//! Canonical record types produced by the normalizer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Vendor column holding the trading date.
pub const VENDOR_DATE: &str = "Ngay";
/// Vendor column holding the closing price.
pub const VENDOR_CLOSE: &str = "GiaDongCua";
/// Vendor column holding the adjusted closing price.
pub const VENDOR_ADJ_CLOSE: &str = "GiaDieuChinh";
/// Vendor column holding the opening price.
pub const VENDOR_OPEN: &str = "GiaMoCua";
/// Vendor column holding the session high.
pub const VENDOR_HIGH: &str = "GiaCaoNhat";
/// Vendor column holding the session low.
pub const VENDOR_LOW: &str = "GiaThapNhat";
/// Vendor column holding the matched volume.
pub const VENDOR_VOLUME: &str = "KhoiLuongKhopLenh";
/// Column attached to every fetched row with the instrument symbol.
pub const SYMBOL_COLUMN: &str = "symbol";

/// Raw table schema: vendor columns followed by the symbol column.
pub const RAW_COLUMNS: [&str; 8] = [
    VENDOR_DATE,
    VENDOR_CLOSE,
    VENDOR_ADJ_CLOSE,
    VENDOR_OPEN,
    VENDOR_HIGH,
    VENDOR_LOW,
    VENDOR_VOLUME,
    SYMBOL_COLUMN,
];

/// Mapping from vendor column names to the canonical schema.
pub const RENAME_MAP: [(&str, &str); 8] = [
    (VENDOR_DATE, "date"),
    (SYMBOL_COLUMN, "ticker"),
    (VENDOR_CLOSE, "close"),
    (VENDOR_ADJ_CLOSE, "adj_close"),
    (VENDOR_OPEN, "open"),
    (VENDOR_HIGH, "high"),
    (VENDOR_LOW, "low"),
    (VENDOR_VOLUME, "volume"),
];

/// One instrument on one trading date.
///
/// Field order matches the column order of the cleaned CSV tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Trading date.
    pub date: NaiveDate,
    /// Instrument symbol.
    pub ticker: String,
    /// Closing price.
    pub close: f64,
    /// Adjusted closing price.
    pub adj_close: f64,
    /// Opening price.
    pub open: f64,
    /// Session high.
    pub high: f64,
    /// Session low.
    pub low: f64,
    /// Matched volume.
    pub volume: f64,
}

/// Annualized riskless rate observed on one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskFreeRecord {
    /// Observation date.
    pub date: NaiveDate,
    /// Annualized rate as a decimal (0.025 for 2.5%).
    pub rate: f64,
}

impl RiskFreeRecord {
    /// Monthly rate with the same compounded yield as the annual rate.
    pub fn monthly_rate(&self) -> f64 {
        (1.0 + self.rate).powf(1.0 / 12.0) - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_monthly_rate_compounds_back() {
        let record = RiskFreeRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            rate: 0.0276,
        };
        let monthly = record.monthly_rate();
        assert_relative_eq!((1.0 + monthly).powi(12) - 1.0, 0.0276, epsilon = 1e-12);
    }

    #[test]
    fn test_rename_map_covers_raw_schema() {
        for column in RAW_COLUMNS {
            assert!(RENAME_MAP.iter().any(|(vendor, _)| *vendor == column));
        }
    }
}
