//! Alpha Vantage market data provider implementation.
//!
//! This module provides quotes from the Alpha Vantage GLOBAL_QUOTE endpoint.
//! Coverage of Indian listings goes through BSE symbols ("RELIANCE.BSE"),
//! so NSE-suffixed requests are served with BSE data - acceptable for a
//! last-resort provider. Indices and search are not implemented here.
//!
//! Alpha Vantage reports numbers as strings with decorations ("0.5114%")
//! and signals rate limiting inside HTTP 200 bodies via "Note"/"Information"
//! fields. The free tier allows 5 API calls per minute.
//! API documentation: https://www.alphavantage.co/documentation/

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::StreamError;
use crate::provider::{QuoteProvider, RawIndex, RawQuote};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";

// ============================================================================
// API Response Structures
// ============================================================================

/// Top-level envelope; exactly one of these fields is populated.
#[derive(Debug, Deserialize)]
struct AvEnvelope {
    #[serde(rename = "Global Quote")]
    global_quote: Option<AvGlobalQuote>,
    /// Rate limit notice (free tier)
    #[serde(rename = "Note")]
    note: Option<String>,
    /// Premium-endpoint notice, also sent when the daily quota is spent
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

/// The GLOBAL_QUOTE payload with its numbered field names.
#[derive(Debug, Default, Deserialize)]
struct AvGlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "02. open", default)]
    open: Value,
    #[serde(rename = "03. high", default)]
    high: Value,
    #[serde(rename = "04. low", default)]
    low: Value,
    #[serde(rename = "05. price", default)]
    price: Value,
    #[serde(rename = "06. volume", default)]
    volume: Value,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "08. previous close", default)]
    previous_close: Value,
    #[serde(rename = "09. change", default)]
    change: Value,
    #[serde(rename = "10. change percent", default)]
    change_percent: Value,
}

// ============================================================================
// AlphaVantageProvider
// ============================================================================

/// Alpha Vantage provider, quotes only.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
}

impl AlphaVantageProvider {
    /// Create a new Alpha Vantage provider with the given API key.
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, api_key }
    }

    /// Make a GET request to the query endpoint.
    async fn fetch(&self, params: &[(&str, &str)]) -> Result<String, StreamError> {
        let mut request = self
            .client
            .get(BASE_URL)
            .query(&[("apikey", &self.api_key)]);
        for (key, value) in params {
            request = request.query(&[(key, value)]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StreamError::Transport {
                    provider: PROVIDER_ID.to_string(),
                    status: None,
                    message: "Request timed out".to_string(),
                }
            } else {
                StreamError::Transport {
                    provider: PROVIDER_ID.to_string(),
                    status: None,
                    message: format!("Request failed: {}", e),
                }
            }
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(StreamError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::Transport {
                provider: PROVIDER_ID.to_string(),
                status: Some(status.as_u16()),
                message: format!("HTTP {} - {}", status, body),
            });
        }

        response.text().await.map_err(|e| StreamError::Transport {
            provider: PROVIDER_ID.to_string(),
            status: None,
            message: format!("Failed to read response: {}", e),
        })
    }

    fn parse_global_quote(text: &str) -> Result<AvGlobalQuote, StreamError> {
        let envelope: AvEnvelope =
            serde_json::from_str(text).map_err(|e| StreamError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse response: {}", e),
            })?;

        // Rate limiting arrives as HTTP 200 with a prose body
        if envelope.note.is_some() || envelope.information.is_some() {
            return Err(StreamError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if let Some(message) = envelope.error_message {
            return Err(StreamError::Transport {
                provider: PROVIDER_ID.to_string(),
                status: None,
                message,
            });
        }

        let quote = envelope
            .global_quote
            .ok_or_else(|| StreamError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: "Response had no Global Quote".to_string(),
            })?;

        // Unknown symbols come back as "Global Quote": {}
        if quote.symbol.is_none() && quote.price.is_null() {
            return Err(StreamError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: "Empty Global Quote".to_string(),
            });
        }

        Ok(quote)
    }
}

// ============================================================================
// QuoteProvider Implementation
// ============================================================================

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn calls_per_minute(&self) -> u32 {
        // Free tier limit
        5
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, StreamError> {
        let av_symbol = to_av_symbol(symbol)?;
        debug!("Fetching quote for {} from Alpha Vantage as {}", symbol, av_symbol);

        let params = [
            ("function", "GLOBAL_QUOTE"),
            ("symbol", av_symbol.as_str()),
        ];
        let text = self.fetch(&params).await?;
        let quote = Self::parse_global_quote(&text)?;

        Ok(RawQuote {
            price: quote.price,
            change: quote.change,
            percent_change: quote.change_percent,
            previous_close: quote.previous_close,
            open: quote.open,
            day_high: quote.high,
            day_low: quote.low,
            volume: quote.volume,
            timestamp: quote
                .latest_trading_day
                .as_deref()
                .and_then(trading_day_timestamp),
            ..RawQuote::for_symbol(symbol)
        })
    }

    async fn fetch_indices(&self) -> Result<Vec<RawIndex>, StreamError> {
        Err(StreamError::NotSupported {
            provider: PROVIDER_ID.to_string(),
            operation: "indices".to_string(),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Maps the dashboard's suffix convention to Alpha Vantage's BSE symbols.
/// Index symbols have no Alpha Vantage equivalent.
fn to_av_symbol(symbol: &str) -> Result<String, StreamError> {
    if symbol.starts_with('^') {
        return Err(StreamError::NotSupported {
            provider: PROVIDER_ID.to_string(),
            operation: format!("index quote {}", symbol),
        });
    }
    if let Some(base) = symbol.strip_suffix(".NS").or_else(|| symbol.strip_suffix(".BO")) {
        Ok(format!("{}.BSE", base))
    } else {
        Ok(symbol.to_string())
    }
}

/// "2024-01-02" -> Unix seconds at midnight UTC.
fn trading_day_timestamp(day: &str) -> Option<i64> {
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

// ============================================================================
// Tests
// ============================================================================
