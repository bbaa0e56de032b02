//! Search result models for symbol lookup.

use serde::{Deserialize, Serialize};

/// Result from a ticker/symbol search.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SymbolMatch {
    /// Symbol/ticker (e.g., "RELIANCE.NS", "TCS.BO")
    pub symbol: String,

    /// Short display name (e.g., "Reliance Industries Ltd")
    pub name: String,

    /// Exchange name (e.g., "NSE", "BSE")
    pub exchange: String,

    /// Instrument type as reported by the provider (e.g., "Common Stock")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument_type: Option<String>,

    /// Provider that produced the match
    pub source: String,
}

impl SymbolMatch {
    /// Create a match with the required fields.
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        exchange: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            exchange: exchange.into(),
            instrument_type: None,
            source: source.into(),
        }
    }

    /// Set the instrument type.
    pub fn with_instrument_type(mut self, instrument_type: impl Into<String>) -> Self {
        self.instrument_type = Some(instrument_type.into());
        self
    }
}
