//! Integration tests for the vendor payload → cleaned CSV path.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use saigon_data::cafef::parse_history_payload;
use saigon_data::store::{read_prices, read_risk_free, read_string_table, write_frame, write_prices, write_risk_free};
use saigon_data::{Grouping, normalize_prices, normalize_risk_free};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

const PAYLOAD: &str = r#"{"Data": {"TotalCount": 4, "Data": [
    {"Ngay": "06/01/2020", "GiaDongCua": "1,012.25", "GiaDieuChinh": 1012.25, "GiaMoCua": 1000,
     "GiaCaoNhat": 1015.5, "GiaThapNhat": 998.1, "KhoiLuongKhopLenh": 2500300},
    {"Ngay": "03/01/2020", "GiaDongCua": null, "GiaDieuChinh": 1003.1, "GiaMoCua": 999,
     "GiaCaoNhat": 1004, "GiaThapNhat": 990.7, "KhoiLuongKhopLenh": 1800000},
    {"Ngay": "02/01/2020", "GiaDongCua": 1001.333333333, "GiaDieuChinh": 1001.333333333,
     "GiaMoCua": 995, "GiaCaoNhat": 1002, "GiaThapNhat": 993.25, "KhoiLuongKhopLenh": 1500000},
    {"Ngay": "02/01/2020", "GiaDongCua": 1, "GiaDieuChinh": 1, "GiaMoCua": 1,
     "GiaCaoNhat": 1, "GiaThapNhat": 1, "KhoiLuongKhopLenh": 1}
]}}"#;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("saigon-data-it-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_payload_to_clean_csv_roundtrip() {
    let dir = scratch("roundtrip");

    let mut raw = parse_history_payload("VNINDEX", PAYLOAD).unwrap();
    let raw_path = dir.join("vnindex_raw.csv");
    write_frame(&mut raw, &raw_path).unwrap();
    let raw_back = read_string_table(&raw_path).unwrap();
    assert_eq!(raw_back.height(), 4);

    let cleaned = normalize_prices(&raw_back, Grouping::Global).unwrap();
    assert_eq!(cleaned.records.len(), 3);
    assert_eq!(cleaned.report.duplicates_removed, 1);

    let dates: Vec<NaiveDate> = cleaned.records.iter().map(|r| r.date).collect();
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted);
    let unique: HashSet<_> = cleaned.records.iter().map(|r| (r.ticker.clone(), r.date)).collect();
    assert_eq!(unique.len(), cleaned.records.len());

    // The 03/01 close is carried from 02/01.
    assert_relative_eq!(cleaned.records[1].close, 1001.333333333);
    assert_relative_eq!(cleaned.records[2].close, 1012.25);

    let clean_path = dir.join("vnindex_clean.csv");
    write_prices(&cleaned.records, &clean_path).unwrap();
    let reread = read_prices(&clean_path).unwrap();
    assert_eq!(reread.len(), cleaned.records.len());
    for (a, b) in reread.iter().zip(&cleaned.records) {
        assert_eq!(a.date, b.date);
        assert_eq!(a.ticker, b.ticker);
        assert_relative_eq!(a.close, b.close, max_relative = 1e-9);
        assert_relative_eq!(a.adj_close, b.adj_close, max_relative = 1e-9);
        assert_relative_eq!(a.volume, b.volume, max_relative = 1e-9);
    }

    fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_risk_free_source_roundtrip() {
    let dir = scratch("riskfree");
    let source = dir.join("risk_free_rate.csv");
    fs::write(
        &source,
        "\u{feff}Ngày,Lần cuối,Mở,Cao,Thấp,% Thay đổi\n\
         03/01/2020,\"2,807\",2.8,2.81,2.79,0.25%\n\
         02/01/2020,2.800,2.8,2.8,2.8,0.00%\n",
    )
    .unwrap();

    let table = read_string_table(&source).unwrap();
    let cleaned = normalize_risk_free(&table).unwrap();
    assert_eq!(cleaned.records.len(), 2);
    assert_eq!(cleaned.records[0].date, NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
    assert_relative_eq!(cleaned.records[0].rate, 0.028);

    let clean_path = dir.join("risk_free_clean.csv");
    write_risk_free(&cleaned.records, &clean_path).unwrap();
    let reread = read_risk_free(&clean_path).unwrap();
    assert_eq!(reread, cleaned.records);

    fs::remove_dir_all(dir).unwrap();
}
