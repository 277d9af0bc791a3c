//! CafeF data provider.
//!
//! This module fetches daily price histories for Vietnamese listed
//! instruments and indices from the public CafeF endpoint.
//!
//! # Example
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use saigon_data::cafef::CafefClient;
//!
//! # async fn example() -> saigon_data::Result<()> {
//! let client = CafefClient::new()?;
//! let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
//! let end = NaiveDate::from_ymd_opt(2025, 11, 21).unwrap();
//! let history = client.fetch_history("VJC", start, end).await?;
//! println!("{history}");
//! # Ok(())
//! # }
//! ```

mod client;
mod history;

pub use client::{CAFEF_HISTORY_URL, CafefClient, CafefConfig};
pub use history::parse_history_payload;
