use serde::{Deserialize, Serialize};

use super::index::IndexSnapshot;
use super::quote::Quote;

/// What a subscription asks the provider chain to fetch on every tick.
///
/// Build values through the constructors: they trim and uppercase symbols and
/// sort/dedup batch lists, so equivalent requests share one cache key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamRequest {
    /// A single symbol
    Quote { symbol: String },

    /// A batch of symbols
    Quotes { symbols: Vec<String> },

    /// The tracked index catalog
    Indices,
}

/// Broad category of a request, used to pick polling intervals and cache TTLs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataKind {
    Quote,
    Indices,
}

impl StreamRequest {
    /// Request for one symbol's quote.
    pub fn quote(symbol: impl AsRef<str>) -> Self {
        Self::Quote {
            symbol: canonical_symbol(symbol.as_ref()),
        }
    }

    /// Request for a batch of quotes. Symbols are canonicalized, sorted and
    /// deduplicated so overlapping subscriptions agree on one cache key.
    pub fn quotes<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut symbols: Vec<String> = symbols
            .into_iter()
            .map(|s| canonical_symbol(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();
        symbols.sort();
        symbols.dedup();
        Self::Quotes { symbols }
    }

    /// Request for the tracked indices.
    pub fn indices() -> Self {
        Self::Indices
    }

    pub fn kind(&self) -> DataKind {
        match self {
            Self::Quote { .. } | Self::Quotes { .. } => DataKind::Quote,
            Self::Indices => DataKind::Indices,
        }
    }

    /// Cache key shared by every subscription asking for the same data.
    pub fn cache_key(&self) -> String {
        match self {
            Self::Quote { symbol } => format!("quote:{}", symbol),
            Self::Quotes { symbols } => format!("quotes:{}", symbols.join(",")),
            Self::Indices => "indices".to_string(),
        }
    }

    /// Short human-readable form for log and error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Quote { symbol } => format!("quote {}", symbol),
            Self::Quotes { symbols } => format!("quotes {}", symbols.join(",")),
            Self::Indices => "indices".to_string(),
        }
    }
}

/// Data delivered to a subscriber, shaped by its request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StreamPayload {
    Quote(Quote),
    Quotes(Vec<Quote>),
    Indices(Vec<IndexSnapshot>),
}

fn canonical_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_canonicalizes_symbol() {
        let request = StreamRequest::quote(" reliance.ns ");
        assert_eq!(
            request,
            StreamRequest::Quote {
                symbol: "RELIANCE.NS".to_string()
            }
        );
    }

    #[test]
    fn test_quotes_sorts_and_dedups() {
        let request = StreamRequest::quotes(["tcs.ns", "INFY.NS", "infy.ns"]);
        assert_eq!(
            request,
            StreamRequest::Quotes {
                symbols: vec!["INFY.NS".to_string(), "TCS.NS".to_string()]
            }
        );
    }

    #[test]
    fn test_cache_key_ignores_symbol_order() {
        let a = StreamRequest::quotes(["INFY.NS", "TCS.NS"]);
        let b = StreamRequest::quotes(["TCS.NS", "INFY.NS"]);
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), "quotes:INFY.NS,TCS.NS");
    }

    #[test]
    fn test_kind_maps_batches_to_quote() {
        assert_eq!(StreamRequest::quote("INFY.NS").kind(), DataKind::Quote);
        assert_eq!(StreamRequest::quotes(["INFY.NS"]).kind(), DataKind::Quote);
        assert_eq!(StreamRequest::indices().kind(), DataKind::Indices);
    }
}
