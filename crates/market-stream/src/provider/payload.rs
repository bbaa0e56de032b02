//! Provider-agnostic raw payload shapes.
//!
//! Providers map their HTTP responses into these loose structs and hand them
//! to the normalizer. Numeric-ish fields stay as `serde_json::Value` because
//! upstreams disagree about types: Twelve Data and Alpha Vantage send numbers
//! as strings ("2,456.75", "-1.23%"), Finnhub sends plain JSON numbers. The
//! normalizer owns all coercion rules; providers just shovel fields.

use serde_json::Value;

/// Raw single-symbol quote as one provider reported it.
#[derive(Clone, Debug, Default)]
pub struct RawQuote {
    pub symbol: String,
    pub name: Option<String>,
    pub price: Value,
    pub change: Value,
    pub percent_change: Value,
    pub previous_close: Value,
    pub open: Value,
    pub day_high: Value,
    pub day_low: Value,
    pub week_52_high: Value,
    pub week_52_low: Value,
    pub volume: Value,
    pub market_cap: Value,
    pub pe_ratio: Value,
    pub pb_ratio: Value,
    pub dividend_yield: Value,
    pub sector: Option<String>,
    pub exchange: Option<String>,
    /// Unix seconds, when the provider reports one
    pub timestamp: Option<i64>,
}

impl RawQuote {
    /// Empty shell for the given symbol; absent fields normalize to defaults.
    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }
}

/// Raw index level as one provider reported it.
#[derive(Clone, Debug, Default)]
pub struct RawIndex {
    pub symbol: String,
    pub name: Option<String>,
    pub value: Value,
    pub change: Value,
    pub percent_change: Value,
    pub previous_close: Value,
    pub volume: Value,
    /// Unix seconds, when the provider reports one
    pub timestamp: Option<i64>,
}

impl RawIndex {
    /// Empty shell for the given canonical symbol.
    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }
}
