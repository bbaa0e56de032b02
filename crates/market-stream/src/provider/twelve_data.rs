//! Twelve Data market data provider implementation.
//!
//! This module provides market data from the Twelve Data API:
//! - Quotes (single and batch) via the /quote endpoint
//! - Symbol search via the /symbol_search endpoint
//!
//! Twelve Data reports numbers as JSON strings ("2456.75", "-1.23") and
//! keys batch responses by symbol. The free tier is limited to 8 API calls
//! per minute. API documentation: https://twelvedata.com/docs
//!
//! Indian listings are addressed as SYMBOL:EXCHANGE (e.g., "RELIANCE:NSE");
//! this provider translates the dashboard's ".NS"/".BO" suffix convention
//! both ways.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::StreamError;
use crate::models::{SymbolMatch, TRACKED_INDICES};
use crate::provider::{QuoteProvider, RawIndex, RawQuote};

const BASE_URL: &str = "https://api.twelvedata.com";
const PROVIDER_ID: &str = "TWELVE_DATA";

// ============================================================================
// API Response Structures
// ============================================================================

/// One quote object from /quote (fields arrive as strings)
#[derive(Debug, Deserialize)]
struct TdQuote {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    exchange: Option<String>,
    /// Unix seconds
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    open: Value,
    #[serde(default)]
    high: Value,
    #[serde(default)]
    low: Value,
    #[serde(default)]
    close: Value,
    #[serde(default)]
    volume: Value,
    #[serde(default)]
    previous_close: Value,
    #[serde(default)]
    change: Value,
    #[serde(default)]
    percent_change: Value,
    #[serde(default)]
    fifty_two_week: Option<TdFiftyTwoWeek>,
}

#[derive(Debug, Default, Deserialize)]
struct TdFiftyTwoWeek {
    #[serde(default)]
    low: Value,
    #[serde(default)]
    high: Value,
}

/// In-body error envelope ({"code":429,"message":...,"status":"error"})
#[derive(Debug, Deserialize)]
struct TdError {
    code: i64,
    message: String,
    status: String,
}

/// Response from /symbol_search
#[derive(Debug, Deserialize)]
struct TdSearchResponse {
    #[serde(default)]
    data: Vec<TdSearchItem>,
}

#[derive(Debug, Deserialize)]
struct TdSearchItem {
    symbol: String,
    #[serde(default)]
    instrument_name: String,
    #[serde(default)]
    exchange: String,
    #[serde(default)]
    instrument_type: Option<String>,
}

// ============================================================================
// TwelveDataProvider
// ============================================================================

/// Twelve Data provider.
///
/// Primary source for NSE/BSE quotes. Free tier is limited to 8 API calls
/// per minute, which is why batch requests matter here.
pub struct TwelveDataProvider {
    client: Client,
    api_key: String,
}

impl TwelveDataProvider {
    /// Create a new Twelve Data provider with the given API key.
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, api_key }
    }

    /// Make a GET request to the Twelve Data API.
    async fn fetch(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, StreamError> {
        let url = format!("{}{}", BASE_URL, endpoint);

        let mut request = self.client.get(&url).query(&[("apikey", &self.api_key)]);
        for (key, value) in params {
            request = request.query(&[(key, value)]);
        }

        debug!("Twelve Data request: {} with {} params", endpoint, params.len());

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

    /// Detect the in-body error envelope Twelve Data uses even on HTTP 200.
    fn check_body_error(text: &str) -> Result<(), StreamError> {
        if let Ok(err) = serde_json::from_str::<TdError>(text) {
            if err.status == "error" {
                return Err(map_td_error(err));
            }
        }
        Ok(())
    }

    fn parse_quote(text: &str) -> Result<TdQuote, StreamError> {
        Self::check_body_error(text)?;
        serde_json::from_str::<TdQuote>(text).map_err(|e| StreamError::MalformedResponse {
            provider: PROVIDER_ID.to_string(),
            message: format!("Failed to parse quote response: {}", e),
        })
    }

    /// Parse a multi-symbol response: a map of symbol -> quote or per-symbol
    /// error. Entries that fail are skipped; an empty result is an error.
    fn parse_quote_map(text: &str) -> Result<Vec<TdQuote>, StreamError> {
        Self::check_body_error(text)?;

        let entries: HashMap<String, Value> =
            serde_json::from_str(text).map_err(|e| StreamError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse batch response: {}", e),
            })?;

        let mut quotes = Vec::with_capacity(entries.len());
        for (key, entry) in entries {
            if let Ok(err) = serde_json::from_value::<TdError>(entry.clone()) {
                if err.status == "error" {
                    warn!("Twelve Data batch entry {} failed: {}", key, err.message);
                    continue;
                }
            }
            match serde_json::from_value::<TdQuote>(entry) {
                Ok(quote) => quotes.push(quote),
                Err(e) => warn!("Twelve Data batch entry {} unparsable: {}", key, e),
            }
        }

        if quotes.is_empty() {
            return Err(StreamError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: "Batch response contained no usable quotes".to_string(),
            });
        }

        Ok(quotes)
    }
}

// ============================================================================
// QuoteProvider Implementation
// ============================================================================

#[async_trait]
impl QuoteProvider for TwelveDataProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn calls_per_minute(&self) -> u32 {
        // Free tier limit
        8
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, StreamError> {
        let td_symbol = to_td_symbol(symbol);
        let params = [("symbol", td_symbol.as_str())];
        let text = self.fetch("/quote", &params).await?;
        let quote = Self::parse_quote(&text)?;
        Ok(raw_from_td(quote, Some(symbol)))
    }

    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<RawQuote>, StreamError> {
        if symbols.len() == 1 {
            return Ok(vec![self.fetch_quote(&symbols[0]).await?]);
        }

        let joined = symbols
            .iter()
            .map(|s| to_td_symbol(s))
            .collect::<Vec<_>>()
            .join(",");
        let params = [("symbol", joined.as_str())];
        let text = self.fetch("/quote", &params).await?;

        let quotes = Self::parse_quote_map(&text)?;
        debug!(
            "Twelve Data: batch returned {}/{} quotes",
            quotes.len(),
            symbols.len()
        );
        Ok(quotes
            .into_iter()
            .map(|quote| raw_from_td(quote, None))
            .collect())
    }

    async fn fetch_indices(&self) -> Result<Vec<RawIndex>, StreamError> {
        let joined = TRACKED_INDICES
            .iter()
            .map(|info| td_index_symbol(info.symbol))
            .collect::<Vec<_>>()
            .join(",");
        let params = [("symbol", joined.as_str())];
        let text = self.fetch("/quote", &params).await?;

        let quotes = Self::parse_quote_map(&text)?;
        let mut snapshots = Vec::with_capacity(quotes.len());
        for quote in quotes {
            // Map the provider's index notation back to the canonical symbol.
            let Some(info) = TRACKED_INDICES
                .iter()
                .find(|info| td_index_symbol(info.symbol) == quote.symbol)
            else {
                warn!("Twelve Data returned unknown index {}", quote.symbol);
                continue;
            };
            snapshots.push(RawIndex {
                symbol: info.symbol.to_string(),
                name: Some(info.name.to_string()),
                value: quote.close,
                change: quote.change,
                percent_change: quote.percent_change,
                previous_close: quote.previous_close,
                volume: quote.volume,
                timestamp: quote.timestamp,
            });
        }

        if snapshots.is_empty() {
            return Err(StreamError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: "Index response contained no tracked indices".to_string(),
            });
        }
        Ok(snapshots)
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, StreamError> {
        let params = [("symbol", query), ("outputsize", "30")];
        let text = self.fetch("/symbol_search", &params).await?;
        Self::check_body_error(&text)?;

        let response: TdSearchResponse =
            serde_json::from_str(&text).map_err(|e| StreamError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse search response: {}", e),
            })?;

        let matches: Vec<SymbolMatch> = response
            .data
            .into_iter()
            .filter(|item| item.exchange == "NSE" || item.exchange == "BSE")
            .map(|item| {
                let mut result = SymbolMatch::new(
                    qualify_symbol(&item.symbol, &item.exchange),
                    item.instrument_name,
                    item.exchange,
                    PROVIDER_ID,
                );
                if let Some(kind) = item.instrument_type {
                    result = result.with_instrument_type(kind);
                }
                result
            })
            .collect();

        debug!("Twelve Data: found {} search results for '{}'", matches.len(), query);
        Ok(matches)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn map_td_error(err: TdError) -> StreamError {
    if err.code == 429 {
        StreamError::RateLimited {
            provider: PROVIDER_ID.to_string(),
        }
    } else {
        StreamError::Transport {
            provider: PROVIDER_ID.to_string(),
            status: u16::try_from(err.code).ok(),
            message: err.message,
        }
    }
}

/// "RELIANCE.NS" -> "RELIANCE:NSE", "TCS.BO" -> "TCS:BSE"; indices map via
/// [`td_index_symbol`]. Unqualified symbols pass through untouched.
fn to_td_symbol(symbol: &str) -> String {
    if symbol.starts_with('^') {
        return td_index_symbol(symbol).to_string();
    }
    if let Some(base) = symbol.strip_suffix(".NS") {
        format!("{}:NSE", base)
    } else if let Some(base) = symbol.strip_suffix(".BO") {
        format!("{}:BSE", base)
    } else {
        symbol.to_string()
    }
}

/// Canonical index symbol -> Twelve Data notation.
fn td_index_symbol(symbol: &str) -> &str {
    match symbol {
        "^NSEI" => "NIFTY_50",
        "^BSESN" => "SENSEX",
        "^NSEBANK" => "BANKNIFTY",
        other => other,
    }
}

/// Bare symbol + exchange -> the dashboard's suffix convention.
fn qualify_symbol(symbol: &str, exchange: &str) -> String {
    match exchange {
        "NSE" => format!("{}.NS", symbol),
        "BSE" => format!("{}.BO", symbol),
        _ => symbol.to_string(),
    }
}

fn raw_from_td(quote: TdQuote, requested: Option<&str>) -> RawQuote {
    let symbol = match requested {
        Some(symbol) => symbol.to_string(),
        None => qualify_symbol(&quote.symbol, quote.exchange.as_deref().unwrap_or_default()),
    };
    let (week_52_low, week_52_high) = quote
        .fifty_two_week
        .map(|band| (band.low, band.high))
        .unwrap_or_default();

    RawQuote {
        symbol,
        name: quote.name,
        price: quote.close,
        change: quote.change,
        percent_change: quote.percent_change,
        previous_close: quote.previous_close,
        open: quote.open,
        day_high: quote.high,
        day_low: quote.low,
        week_52_high,
        week_52_low,
        volume: quote.volume,
        exchange: quote.exchange,
        timestamp: quote.timestamp,
        ..RawQuote::default()
    }
}

// ============================================================================
// Tests
// ============================================================================
