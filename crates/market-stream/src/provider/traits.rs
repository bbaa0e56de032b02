//! Provider trait definition.
//!
//! This module defines the core `QuoteProvider` trait that all upstream
//! market data sources implement.

use async_trait::async_trait;

use crate::errors::StreamError;
use crate::models::{ProviderId, SymbolMatch};

use super::payload::{RawIndex, RawQuote};

/// Trait for upstream quote providers.
///
/// Implement this trait to add support for a new market data source. The
/// provider chain consults providers in its configured order, gating each
/// call on the provider's circuit breaker and calls-per-minute budget.
///
/// Providers return *raw* payloads; all numeric coercion and invariant
/// bookkeeping happens in the normalizer, so implementations just map their
/// API's fields across.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use finboard_market_stream::provider::{QuoteProvider, RawQuote};
///
/// struct MyProvider {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl QuoteProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn calls_per_minute(&self) -> u32 {
///         30
///     }
///
///     // ... implement fetch methods
/// }
/// ```
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "TWELVE_DATA", "FINNHUB", etc.
    /// Used for logging, rate limiting and circuit breaker tracking.
    fn id(&self) -> ProviderId;

    /// Calls-per-minute budget for this provider, typically its free-tier
    /// limit. The chain's rate limiter derives the minimum inter-call
    /// interval from this.
    fn calls_per_minute(&self) -> u32;

    /// Fetch the raw quote for one exchange-qualified symbol.
    async fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, StreamError>;

    /// Fetch raw quotes for a batch of symbols.
    ///
    /// The default implementation loops [`fetch_quote`](Self::fetch_quote)
    /// sequentially; providers with a real batch endpoint should override it.
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<RawQuote>, StreamError> {
        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            quotes.push(self.fetch_quote(symbol).await?);
        }
        Ok(quotes)
    }

    /// Fetch raw snapshots for every index in the tracked catalog.
    async fn fetch_indices(&self) -> Result<Vec<RawIndex>, StreamError>;

    /// Search for symbols matching the query.
    ///
    /// Default implementation returns `NotSupported`; the chain then tries
    /// the next provider.
    async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, StreamError> {
        let _ = query;
        Err(StreamError::NotSupported {
            provider: self.id().to_string(),
            operation: "search".to_string(),
        })
    }
}
