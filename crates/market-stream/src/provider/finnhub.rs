//! Finnhub market data provider implementation.
//!
//! This module provides market data from the Finnhub API:
//! - Quotes via the /quote endpoint (plain JSON numbers)
//! - Symbol search via the /search endpoint
//!
//! Finnhub free tier is limited to 60 API calls per minute.
//! API documentation: https://finnhub.io/docs/api

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::StreamError;
use crate::models::{SymbolMatch, TRACKED_INDICES};
use crate::provider::{QuoteProvider, RawIndex, RawQuote};

const BASE_URL: &str = "https://finnhub.io/api/v1";
const PROVIDER_ID: &str = "FINNHUB";

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /quote endpoint
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// Change
    d: Option<f64>,
    /// Percent change
    dp: Option<f64>,
    /// High price of the day
    h: Option<f64>,
    /// Low price of the day
    l: Option<f64>,
    /// Open price of the day
    o: Option<f64>,
    /// Previous close price
    pc: Option<f64>,
    /// Timestamp (Unix)
    t: Option<i64>,
}

/// Response from /search endpoint
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchItem>,
}

/// Individual search result item
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    /// Full description/name
    description: String,
    /// Display symbol
    display_symbol: String,
    /// Symbol for API calls
    symbol: String,
    /// Security type (e.g., "Common Stock", "ETF")
    #[serde(rename = "type")]
    security_type: String,
}

/// Error response from Finnhub
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

// ============================================================================
// FinnhubProvider
// ============================================================================

/// Finnhub market data provider.
///
/// Secondary quote source. Covers NSE/BSE listings through the exchange
/// suffix convention ("RELIANCE.NS") and the tracked indices through their
/// caret symbols. Free tier is limited to 60 API calls per minute.
pub struct FinnhubProvider {
    client: Client,
    api_key: String,
}

impl FinnhubProvider {
    /// Create a new Finnhub provider with the given API key.
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, api_key }
    }

    /// Make a GET request to the Finnhub API.
    async fn fetch(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, StreamError> {
        let url = format!("{}{}", BASE_URL, endpoint);

        let mut request = self.client.get(&url);

        // API key goes in a header rather than the query string
        request = request.header("X-Finnhub-Token", &self.api_key);

        for (key, value) in params {
            request = request.query(&[(key, value)]);
        }

        debug!("Finnhub request: {} with {} params", endpoint, params.len());

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

        // Finnhub answers quota exhaustion with 403 as well
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(StreamError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(StreamError::Transport {
                provider: PROVIDER_ID.to_string(),
                status: Some(status.as_u16()),
                message: "Invalid or missing API key".to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if let Ok(error_resp) = serde_json::from_str::<ErrorResponse>(&body) {
                if let Some(error_msg) = error_resp.error {
                    return Err(StreamError::Transport {
                        provider: PROVIDER_ID.to_string(),
                        status: Some(status.as_u16()),
                        message: error_msg,
                    });
                }
            }

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

    async fn fetch_quote_response(&self, symbol: &str) -> Result<QuoteResponse, StreamError> {
        let params = [("symbol", symbol)];
        let text = self.fetch("/quote", &params).await?;

        let response: QuoteResponse =
            serde_json::from_str(&text).map_err(|e| StreamError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse quote response: {}", e),
            })?;

        // Finnhub returns an all-zero quote for unknown symbols instead of
        // an error
        if response.c.unwrap_or(0.0) == 0.0 && response.o.unwrap_or(0.0) == 0.0 {
            return Err(StreamError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("No trading data for symbol: {}", symbol),
            });
        }

        Ok(response)
    }
}

// ============================================================================
// QuoteProvider Implementation
// ============================================================================

#[async_trait]
impl QuoteProvider for FinnhubProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn calls_per_minute(&self) -> u32 {
        // Free tier limit
        60
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, StreamError> {
        debug!("Fetching quote for {} from Finnhub", symbol);
        let response = self.fetch_quote_response(symbol).await?;
        Ok(raw_from_response(symbol, response))
    }

    async fn fetch_indices(&self) -> Result<Vec<RawIndex>, StreamError> {
        let mut snapshots = Vec::with_capacity(TRACKED_INDICES.len());
        for info in TRACKED_INDICES.iter() {
            match self.fetch_quote_response(info.symbol).await {
                Ok(response) => snapshots.push(RawIndex {
                    symbol: info.symbol.to_string(),
                    name: Some(info.name.to_string()),
                    value: opt_value(response.c),
                    change: opt_value(response.d),
                    percent_change: opt_value(response.dp),
                    previous_close: opt_value(response.pc),
                    volume: Value::Null,
                    timestamp: response.t,
                }),
                // One missing index should not sink the rest
                Err(StreamError::MalformedResponse { message, .. }) => {
                    warn!("Finnhub has no data for index {}: {}", info.symbol, message);
                }
                Err(e) => return Err(e),
            }
        }

        if snapshots.is_empty() {
            return Err(StreamError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: "No tracked index returned data".to_string(),
            });
        }
        Ok(snapshots)
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, StreamError> {
        let params = [("q", query)];
        let text = self.fetch("/search", &params).await?;

        let response: SearchResponse =
            serde_json::from_str(&text).map_err(|e| StreamError::MalformedResponse {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse search response: {}", e),
            })?;

        let matches: Vec<SymbolMatch> = response
            .result
            .into_iter()
            .map(|item| {
                SymbolMatch::new(
                    item.symbol,
                    item.description,
                    exchange_hint(&item.display_symbol),
                    PROVIDER_ID,
                )
                .with_instrument_type(item.security_type)
            })
            .collect();

        debug!("Finnhub: found {} search results for '{}'", matches.len(), query);
        Ok(matches)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn opt_value(v: Option<f64>) -> Value {
    v.map(Value::from).unwrap_or(Value::Null)
}

fn raw_from_response(symbol: &str, response: QuoteResponse) -> RawQuote {
    RawQuote {
        price: opt_value(response.c),
        change: opt_value(response.d),
        percent_change: opt_value(response.dp),
        previous_close: opt_value(response.pc),
        open: opt_value(response.o),
        day_high: opt_value(response.h),
        day_low: opt_value(response.l),
        timestamp: response.t,
        ..RawQuote::for_symbol(symbol)
    }
}

/// Exchange display hint from a suffixed symbol.
fn exchange_hint(display_symbol: &str) -> &'static str {
    if display_symbol.ends_with(".BO") {
        "BSE"
    } else if display_symbol.ends_with(".NS") {
        "NSE"
    } else {
        ""
    }
}

// ============================================================================
// Tests
// ============================================================================
