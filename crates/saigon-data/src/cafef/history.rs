//! Decoding of the CafeF price history envelope.

use crate::error::{DataError, Result};
use crate::records::{RAW_COLUMNS, SYMBOL_COLUMN};
use polars::prelude::*;
use serde_json::Value;

/// Turn a CafeF response body into a raw price table.
///
/// The rows live under `Data.Data`. Every vendor column is kept as text so
/// that localized numbers survive until normalization; fields absent from a
/// row become null. A `symbol` column carrying `symbol` is appended.
pub fn parse_history_payload(symbol: &str, body: &str) -> Result<DataFrame> {
    let envelope: Value = serde_json::from_str(body).map_err(|e| DataError::Envelope {
        symbol: symbol.to_string(),
        reason: format!("body is not JSON: {e}"),
    })?;

    let rows = envelope
        .get("Data")
        .and_then(|data| data.get("Data"))
        .and_then(Value::as_array)
        .ok_or_else(|| DataError::Envelope {
            symbol: symbol.to_string(),
            reason: "no Data.Data array".to_string(),
        })?;

    if rows.is_empty() {
        return Err(DataError::MissingData {
            symbol: symbol.to_string(),
            reason: "empty price history".to_string(),
        });
    }

    let mut columns: Vec<Column> = RAW_COLUMNS
        .iter()
        .filter(|name| **name != SYMBOL_COLUMN)
        .map(|name| {
            let values: Vec<Option<String>> = rows
                .iter()
                .map(|row| row.get(*name).and_then(value_text))
                .collect();
            Column::new((*name).into(), values)
        })
        .collect();
    columns.push(Column::new(SYMBOL_COLUMN.into(), vec![symbol; rows.len()]));

    Ok(DataFrame::new(columns)?)
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Data": {
            "TotalCount": 2,
            "Data": [
                {"Ngay": "21/11/2025", "GiaDongCua": 25.3, "GiaDieuChinh": 25.3,
                 "GiaMoCua": 25.0, "GiaCaoNhat": 25.6, "GiaThapNhat": 24.9,
                 "KhoiLuongKhopLenh": 1234500, "ThayDoi": "0.3(1.20 %)"},
                {"Ngay": "20/11/2025", "GiaDongCua": "1,250.5", "GiaDieuChinh": null,
                 "GiaMoCua": 25.1, "GiaCaoNhat": 25.2, "GiaThapNhat": 24.8,
                 "KhoiLuongKhopLenh": 998000}
            ]
        },
        "Message": null,
        "Success": true
    }"#;

    #[test]
    fn test_parse_sample_payload() {
        let df = parse_history_payload("VJC", SAMPLE).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), RAW_COLUMNS.len());

        let close = df.column("GiaDongCua").unwrap().str().unwrap();
        assert_eq!(close.get(0), Some("25.3"));
        assert_eq!(close.get(1), Some("1,250.5"));

        let adj = df.column("GiaDieuChinh").unwrap().str().unwrap();
        assert_eq!(adj.get(1), None);

        let symbol = df.column(SYMBOL_COLUMN).unwrap().str().unwrap();
        assert!(symbol.into_iter().all(|s| s == Some("VJC")));
    }

    #[test]
    fn test_missing_nested_data() {
        let result = parse_history_payload("VJC", r#"{"Data": {"TotalCount": 0}}"#);
        assert!(matches!(result, Err(DataError::Envelope { .. })));
    }

    #[test]
    fn test_not_json() {
        let result = parse_history_payload("VJC", "<html>blocked</html>");
        assert!(matches!(result, Err(DataError::Envelope { .. })));
    }

    #[test]
    fn test_empty_rows() {
        let result = parse_history_payload("VJC", r#"{"Data": {"Data": []}}"#);
        assert!(matches!(result, Err(DataError::MissingData { .. })));
    }
}
