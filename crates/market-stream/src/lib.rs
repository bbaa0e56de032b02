//! Finboard Market Stream Crate
//!
//! This crate provides the real-time quote streaming engine for the
//! Finboard dashboard.
//!
//! # Overview
//!
//! The market stream crate supports:
//! - NSE/BSE equity quotes and the tracked index catalog (NIFTY 50,
//!   SENSEX, NIFTY BANK)
//! - Multiple providers consulted in priority order: Twelve Data, Finnhub,
//!   Alpha Vantage
//! - Per-provider call budgets and circuit breaking
//! - TTL response caching shared across subscriptions
//! - Per-subscription polling loops with linear-backoff retries
//! - Deterministic synthetic fallback so the dashboard never renders blank
//!
//! # Architecture
//!
//! ```text
//! +--------------+     +-----------------+
//! |  Subscriber  | --> |  StreamManager  |  (one polling task each)
//! +--------------+     +-----------------+
//!                               |
//!                               v
//!                      +-----------------+
//!                      |  ResponseCache  |  (TTL keyed by request)
//!                      +-----------------+
//!                               | miss
//!                               v
//!                      +-----------------+
//!                      |  ProviderChain  |  (limits + circuit breaker)
//!                      +-----------------+
//!                               |
//!                               v
//!                      +-----------------+
//!                      |    Providers    |  (HTTP, API keys from env)
//!                      +-----------------+
//!                               |
//!                               v
//!                      +-----------------+
//!                      | Quote / Indices |  (normalized, or synthetic)
//!                      +-----------------+
//! ```
//!
//! # Core Types
//!
//! - [`StreamManager`] - Owns the subscriptions, cache, and shared status
//! - [`StreamRequest`] - What one subscription polls (quote, batch, indices)
//! - [`SubscriptionHandle`] - Consumer's event receiver and status watch
//! - [`ProviderChain`] - Ordered fallthrough over the configured providers
//! - [`Quote`] / [`IndexSnapshot`] - Canonical market data shapes
//! - [`StreamStatus`] - Global connectivity status with a rolling error log
//!
//! # Type Aliases
//!
//! - [`ProviderId`] - Provider identifier (e.g., "TWELVE_DATA", "FINNHUB")
//! - [`SubscriptionId`] - Consumer-chosen subscription identifier

pub mod chain;
pub mod errors;
pub mod models;
pub mod normalize;
pub mod provider;
pub mod stream;

// Re-export all public types from models
pub use models::{
    index_info, DataKind, IndexInfo, IndexSnapshot, PriceRange, ProviderId, Quote, StreamPayload,
    StreamRequest, StreamStatus, SubscriptionId, SymbolMatch, MAX_RECENT_ERRORS, TRACKED_INDICES,
};

// Re-export the error taxonomy
pub use errors::{RetryClass, StreamError};

// Re-export chain types
pub use chain::{
    ChainFetch, CircuitBreaker, CircuitBreakerConfig, CircuitState, DataOrigin, ProviderChain,
    RateLimiter, ResponseCache, SYNTHETIC_SOURCE,
};

// Re-export normalization helpers
pub use normalize::{
    coerce_decimal, coerce_decimal_opt, exchange_from_symbol, normalize_index, normalize_quote,
};

// Re-export provider types
pub use provider::{
    providers_from_env, AlphaVantageProvider, FinnhubProvider, QuoteProvider, RawIndex, RawQuote,
    TwelveDataProvider,
};

// Re-export the streaming engine
pub use stream::{
    ConfigUpdate, StreamConfig, StreamData, StreamEvent, StreamManager, SubscribeOptions,
    SubscriptionHandle,
};
