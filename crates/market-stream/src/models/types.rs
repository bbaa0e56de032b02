//! Type aliases for common identifiers.

/// Identifier of an upstream data provider (e.g., "TWELVE_DATA", "FINNHUB").
/// Providers declare theirs as a `const`, so a static string is enough.
pub type ProviderId = &'static str;

/// Identifier of one logical subscription, unique per consumer
/// (e.g., "watchlist-card", "portfolio-header-RELIANCE.NS").
pub type SubscriptionId = String;
