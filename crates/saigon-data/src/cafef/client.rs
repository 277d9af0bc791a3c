//! CafeF price-history client with request pacing.

use super::history::parse_history_payload;
use crate::error::{DataError, Result};
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

/// CafeF price history endpoint
pub const CAFEF_HISTORY_URL: &str = "https://s.cafef.vn/Ajax/PageNew/DataHistory/PriceHistory.ashx";

/// Date format expected by the endpoint
const VENDOR_DATE_FORMAT: &str = "%d/%m/%Y";

/// Client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CafefConfig {
    /// Endpoint URL.
    pub endpoint: String,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// `Referer` header value.
    pub referer: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Minimum delay between two requests, in milliseconds.
    pub request_delay_ms: u64,
    /// Page index requested.
    pub page_index: u32,
    /// Page size requested; large enough to cover the whole range in one page.
    pub page_size: u32,
}

impl Default for CafefConfig {
    fn default() -> Self {
        Self {
            endpoint: CAFEF_HISTORY_URL.to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            referer: "https://s.cafef.vn/".to_string(),
            timeout_secs: 20,
            request_delay_ms: 500,
            page_index: 1,
            page_size: 10_000,
        }
    }
}

/// Keeps consecutive requests at least `min_interval` apart.
#[derive(Debug)]
struct RateLimiter {
    last_request: Option<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    const fn new(min_interval: Duration) -> Self {
        Self {
            last_request: None,
            min_interval,
        }
    }

    async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

/// HTTP client for the CafeF daily price history endpoint.
pub struct CafefClient {
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    config: CafefConfig,
}

impl CafefClient {
    /// Create a client with default settings (500ms between requests).
    pub fn new() -> Result<Self> {
        Self::with_config(CafefConfig::default())
    }

    /// Create a client with custom settings.
    ///
    /// # Example
    /// ```no_run
    /// use saigon_data::cafef::{CafefClient, CafefConfig};
    ///
    /// # fn example() -> saigon_data::Result<()> {
    /// let config = CafefConfig {
    ///     request_delay_ms: 1_000,
    ///     ..CafefConfig::default()
    /// };
    /// let client = CafefClient::with_config(config)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_config(config: CafefConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(DataError::Network)?;

        Ok(Self {
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(Duration::from_millis(
                config.request_delay_ms,
            )))),
            config,
        })
    }

    /// Client settings.
    pub const fn config(&self) -> &CafefConfig {
        &self.config
    }

    /// Fetch the daily price history of one instrument.
    ///
    /// # Arguments
    /// * `symbol` - Instrument symbol (e.g., "VJC" or "VNINDEX")
    /// * `start` - First date of the range
    /// * `end` - Last date of the range
    ///
    /// # Returns
    /// A Polars DataFrame with the vendor text columns
    /// (`Ngay`, `GiaDongCua`, `GiaDieuChinh`, `GiaMoCua`, `GiaCaoNhat`,
    /// `GiaThapNhat`, `KhoiLuongKhopLenh`) and a `symbol` column.
    ///
    /// # Errors
    /// Returns `DataError::Envelope` when the body is not JSON or lacks
    /// `Data.Data`, and `DataError::MissingData` when it holds no rows.
    pub async fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DataFrame> {
        if start > end {
            return Err(DataError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        if symbol.trim().is_empty() {
            return Err(DataError::InvalidSymbol("Empty symbol".to_string()));
        }

        self.rate_limiter.lock().await.wait().await;

        let query = [
            ("Symbol", symbol.to_string()),
            ("StartDate", start.format(VENDOR_DATE_FORMAT).to_string()),
            ("EndDate", end.format(VENDOR_DATE_FORMAT).to_string()),
            ("PageIndex", self.config.page_index.to_string()),
            ("PageSize", self.config.page_size.to_string()),
        ];

        debug!(symbol, %start, %end, "requesting price history");

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&query)
            .header(reqwest::header::REFERER, self.config.referer.as_str())
            .send()
            .await
            .map_err(DataError::Network)?;

        if !response.status().is_success() {
            return Err(DataError::Http(format!(
                "Failed to fetch price history for {}: HTTP {}",
                symbol,
                response.status()
            )));
        }

        let body = response.text().await.map_err(DataError::Network)?;

        parse_history_payload(symbol, &body).inspect_err(|e| {
            warn!(symbol, error = %e, "unusable price history response");
        })
    }
}

impl std::fmt::Debug for CafefClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CafefClient")
            .field("endpoint", &self.config.endpoint)
            .field("request_delay_ms", &self.config.request_delay_ms)
            .finish_non_exhaustive()
    }
}
