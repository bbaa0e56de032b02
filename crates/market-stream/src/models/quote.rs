use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A low/high price band (intraday or 52-week).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub low: Decimal,
    pub high: Decimal,
}

/// Canonical real-time quote delivered to subscribers.
///
/// Every provider payload is normalized into this shape before it leaves the
/// chain. Invariants maintained by the normalizer: `change == price -
/// previous_close` and `change_percent == change / previous_close * 100` when
/// `previous_close` is non-zero, else `0`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quote {
    /// Exchange-qualified symbol (e.g., "RELIANCE.NS", "TCS.BO")
    pub symbol: String,

    /// Display name; falls back to the symbol when the provider has none
    pub name: String,

    /// Last traded price
    pub price: Decimal,

    /// Absolute change versus previous close
    pub change: Decimal,

    /// Percent change versus previous close
    pub change_percent: Decimal,

    /// Traded volume for the day (zero when the provider omits it)
    pub volume: Decimal,

    /// Market capitalization (zero when the provider omits it)
    pub market_cap: Decimal,

    /// Sector classification, empty when unknown
    pub sector: String,

    /// Exchange the symbol trades on (e.g., "NSE", "BSE")
    pub exchange: String,

    /// Intraday high
    pub day_high: Decimal,

    /// Intraday low
    pub day_low: Decimal,

    /// Opening price
    pub open: Decimal,

    /// Previous session's closing price
    pub previous_close: Decimal,

    /// 52-week low/high band
    pub week_52_range: PriceRange,

    /// Price-to-earnings ratio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<Decimal>,

    /// Price-to-book ratio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pb_ratio: Option<Decimal>,

    /// Dividend yield in percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dividend_yield: Option<Decimal>,

    /// When this quote was produced
    pub last_updated: DateTime<Utc>,

    /// Source of the quote (TWELVE_DATA, FINNHUB, ALPHA_VANTAGE, SYNTHETIC)
    pub source: String,
}

impl Quote {
    /// Intraday low/high as a band.
    pub fn day_range(&self) -> PriceRange {
        PriceRange {
            low: self.day_low,
            high: self.day_high,
        }
    }
}
