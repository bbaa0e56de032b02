//! Synthetic last-resort data.
//!
//! When every provider in the chain has failed, the dashboard still needs
//! something to render. These generators produce clearly-tagged synthetic
//! payloads: a stable per-symbol base price derived from an MD5 digest of
//! the symbol, plus a small random jitter so consecutive refreshes move
//! the way a live ticker would. The base never changes for a given
//! symbol, so a chart fed from fallback data stays anchored instead of
//! teleporting on every poll.

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;

use crate::models::{IndexInfo, IndexSnapshot, PriceRange, Quote, TRACKED_INDICES};
use crate::normalize::exchange_from_symbol;

/// Source tag carried by every synthetic payload.
pub const SYNTHETIC_SOURCE: &str = "SYNTHETIC";

/// Base prices span 50.00 to 4949.99 rupees, in paise.
const BASE_PRICE_FLOOR_PAISE: u64 = 5_000;
const BASE_PRICE_SPAN_PAISE: u64 = 490_000;

/// Per-refresh jitter for equities, in hundredths of a percent.
const QUOTE_JITTER_BP: i64 = 50;

/// Indices move less between refreshes than single names.
const INDEX_JITTER_BP: i64 = 30;

/// Stable per-symbol seed. Same symbol, same seed, across runs.
fn symbol_seed(symbol: &str) -> u64 {
    let digest = md5::compute(symbol.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.0[..8]);
    u64::from_le_bytes(bytes)
}

/// Deterministic base price for a symbol, used as the previous close.
fn base_price(seed: u64) -> Decimal {
    let paise = BASE_PRICE_FLOOR_PAISE + seed % BASE_PRICE_SPAN_PAISE;
    Decimal::new(paise as i64, 2)
}

/// Apply a random jitter of up to `max_bp` hundredths of a percent.
fn jittered(base: Decimal, max_bp: i64) -> Decimal {
    let bp = rand::thread_rng().gen_range(-max_bp..=max_bp);
    (base * (Decimal::ONE + Decimal::new(bp, 4))).round_dp(2)
}

/// Percent change of `change` against a non-zero `base`.
fn percent_change(change: Decimal, base: Decimal) -> Decimal {
    (change / base * Decimal::ONE_HUNDRED).round_dp(4)
}

/// Display name for a synthetic quote: the symbol with its exchange
/// suffix or index prefix removed.
fn display_name(symbol: &str) -> String {
    symbol
        .trim_start_matches('^')
        .trim_end_matches(".NS")
        .trim_end_matches(".BO")
        .to_string()
}

/// Build a synthetic quote for `symbol`.
///
/// The previous close is the deterministic per-symbol base price and the
/// last price wanders at most half a percent around it, so the usual
/// change invariants hold by construction.
pub fn synthetic_quote(symbol: &str) -> Quote {
    let seed = symbol_seed(symbol);
    let base = base_price(seed);
    let price = jittered(base, QUOTE_JITTER_BP);
    let change = price - base;

    Quote {
        symbol: symbol.to_string(),
        name: display_name(symbol),
        price,
        change,
        change_percent: percent_change(change, base),
        volume: Decimal::from(100_000 + seed % 4_900_000),
        market_cap: Decimal::ZERO,
        sector: String::new(),
        exchange: exchange_from_symbol(symbol).to_string(),
        day_high: price.max(base),
        day_low: price.min(base),
        open: base,
        previous_close: base,
        week_52_range: PriceRange {
            low: (base * Decimal::new(72, 2)).round_dp(2),
            high: (base * Decimal::new(128, 2)).round_dp(2),
        },
        pe_ratio: None,
        pb_ratio: None,
        dividend_yield: None,
        last_updated: Utc::now(),
        source: SYNTHETIC_SOURCE.to_string(),
    }
}

/// Build synthetic quotes for a batch of symbols.
pub fn synthetic_quotes(symbols: &[String]) -> Vec<Quote> {
    symbols.iter().map(|symbol| synthetic_quote(symbol)).collect()
}

/// Build a synthetic snapshot for one tracked index, anchored at the
/// catalog baseline level.
pub fn synthetic_index(info: &IndexInfo) -> IndexSnapshot {
    let value = jittered(info.baseline, INDEX_JITTER_BP);
    let change = value - info.baseline;

    IndexSnapshot {
        name: info.name.to_string(),
        symbol: info.symbol.to_string(),
        value,
        change,
        change_percent: percent_change(change, info.baseline),
        volume: None,
        last_updated: Utc::now(),
        source: SYNTHETIC_SOURCE.to_string(),
    }
}

/// Build synthetic snapshots for the whole tracked-index catalog.
pub fn synthetic_indices() -> Vec<IndexSnapshot> {
    TRACKED_INDICES.iter().map(synthetic_index).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_base_price_is_stable_per_symbol() {
        let first = synthetic_quote("RELIANCE.NS");
        let second = synthetic_quote("RELIANCE.NS");

        // Jitter moves the last price, never the anchor.
        assert_eq!(first.previous_close, second.previous_close);
        assert_eq!(first.open, second.open);
    }

    #[test]
    fn test_base_prices_spread_across_symbols() {
        let anchors = ["RELIANCE.NS", "TCS.NS", "HDFCBANK.NS"]
            .map(|symbol| synthetic_quote(symbol).previous_close);

        assert_ne!(anchors[0], anchors[1]);
        assert_ne!(anchors[1], anchors[2]);
        assert_ne!(anchors[0], anchors[2]);
    }

    #[test]
    fn test_base_price_stays_in_band() {
        for symbol in ["INFY.NS", "SBIN.NS", "ITC.BO", "WIPRO.NS"] {
            let quote = synthetic_quote(symbol);
            assert!(quote.previous_close >= dec!(50.00), "{}", symbol);
            assert!(quote.previous_close < dec!(4950.00), "{}", symbol);
        }
    }

    #[test]
    fn test_change_invariants_hold() {
        let quote = synthetic_quote("TCS.NS");

        assert_eq!(quote.change, quote.price - quote.previous_close);
        // Half a percent of jitter plus two-decimal rounding slack.
        assert!(quote.change_percent.abs() < dec!(0.6));
    }

    #[test]
    fn test_price_stays_inside_day_range() {
        let quote = synthetic_quote("INFY.NS");

        assert!(quote.day_low <= quote.price);
        assert!(quote.price <= quote.day_high);
        assert!(quote.week_52_range.low < quote.price);
        assert!(quote.price < quote.week_52_range.high);
    }

    #[test]
    fn test_quote_metadata() {
        let quote = synthetic_quote("ITC.BO");

        assert_eq!(quote.source, SYNTHETIC_SOURCE);
        assert_eq!(quote.exchange, "BSE");
        assert_eq!(quote.name, "ITC");
        assert!(quote.sector.is_empty());
        assert_eq!(quote.pe_ratio, None);
    }

    #[test]
    fn test_batch_covers_every_symbol() {
        let symbols = vec!["A.NS".to_string(), "B.NS".to_string()];
        let quotes = synthetic_quotes(&symbols);

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].symbol, "A.NS");
        assert_eq!(quotes[1].symbol, "B.NS");
    }

    #[test]
    fn test_indices_anchor_to_catalog_baselines() {
        let snapshots = synthetic_indices();

        assert_eq!(snapshots.len(), TRACKED_INDICES.len());
        for (snapshot, info) in snapshots.iter().zip(TRACKED_INDICES.iter()) {
            assert_eq!(snapshot.symbol, info.symbol);
            assert_eq!(snapshot.name, info.name);
            assert_eq!(snapshot.source, SYNTHETIC_SOURCE);
            assert_eq!(snapshot.change, snapshot.value - info.baseline);
            // At most 0.3% of drift plus rounding slack.
            assert!(snapshot.change_percent.abs() < dec!(0.4));
        }
    }
}
