//! Pure conversion from raw provider payloads into canonical models.
//!
//! Everything in here is a plain function with no I/O: string-to-number
//! coercion tolerant of the formats real quote APIs emit (thousands
//! separators, currency symbols, percent suffixes, "N/A" markers), and the
//! canonicalization that enforces the change/change-percent bookkeeping the
//! dashboard relies on. Unparsable required fields become zero, never an
//! error; unparsable optional fields become absent.

use chrono::{DateTime, Utc};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::models::{index_info, IndexSnapshot, PriceRange, ProviderId, Quote};
use crate::provider::{RawIndex, RawQuote};

/// Coerces a loose JSON value into a `Decimal`, defaulting to zero.
///
/// Accepts plain numbers and the string forms providers actually send:
/// `"1,234.56"`, `"-1.23%"`, `"₹2,456.75"`, `"+0.42"`. Anything else
/// (booleans, objects, garbage text) is zero.
pub fn coerce_decimal(value: &Value) -> Decimal {
    match value {
        Value::Number(n) => number_to_decimal(n),
        Value::String(s) => parse_decimal_str(s).unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

/// Like [`coerce_decimal`] but for optional fields: absent markers and
/// unparsable input surface as `None` rather than zero.
pub fn coerce_decimal_opt(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Some(number_to_decimal(n)),
        Value::String(s) => parse_decimal_str(s),
        _ => None,
    }
}

fn number_to_decimal(n: &serde_json::Number) -> Decimal {
    if let Some(i) = n.as_i64() {
        Decimal::from(i)
    } else if let Some(u) = n.as_u64() {
        Decimal::from(u)
    } else {
        n.as_f64()
            .and_then(Decimal::from_f64)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Parses one numeric string, stripping the decorations quote APIs add.
/// Returns `None` for empty input and the usual absent markers.
fn parse_decimal_str(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    if trimmed.is_empty() || is_absent_marker(trimmed) {
        return None;
    }

    let cleaned: String = trimmed
        .trim_end_matches('%')
        .trim_start_matches('+')
        .chars()
        .filter(|c| !matches!(c, ',' | '₹' | '$' | '€' | '£' | ' '))
        .collect();

    cleaned.parse::<Decimal>().ok()
}

fn is_absent_marker(s: &str) -> bool {
    matches!(
        s.to_ascii_uppercase().as_str(),
        "-" | "--" | "N/A" | "NA" | "NULL" | "NONE"
    )
}

/// Infers the exchange from an exchange-qualified symbol.
pub fn exchange_from_symbol(symbol: &str) -> &'static str {
    if symbol.starts_with('^') {
        "INDEX"
    } else if symbol.ends_with(".BO") {
        "BSE"
    } else {
        "NSE"
    }
}

/// Builds the canonical quote from one provider's raw payload.
///
/// The change bookkeeping prefers `previous_close` as ground truth: when the
/// provider sends it, `change` and `change_percent` are recomputed from it so
/// the invariants hold even for providers that round the derived fields
/// themselves. When it is missing, it is backed out of whichever derived
/// field the provider did send.
pub fn normalize_quote(raw: RawQuote, source: ProviderId) -> Quote {
    let price = coerce_decimal(&raw.price);
    let (previous_close, change, change_percent) = resolve_change(
        price,
        coerce_decimal_opt(&raw.previous_close),
        coerce_decimal_opt(&raw.change),
        coerce_decimal_opt(&raw.percent_change),
    );

    let week_52_range = PriceRange {
        low: coerce_decimal(&raw.week_52_low),
        high: coerce_decimal(&raw.week_52_high),
    };

    let exchange = raw
        .exchange
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| exchange_from_symbol(&raw.symbol).to_string());
    let name = raw
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| raw.symbol.clone());

    Quote {
        name,
        price,
        change,
        change_percent,
        volume: coerce_decimal(&raw.volume),
        market_cap: coerce_decimal(&raw.market_cap),
        sector: raw.sector.unwrap_or_default(),
        exchange,
        day_high: coerce_decimal(&raw.day_high),
        day_low: coerce_decimal(&raw.day_low),
        open: coerce_decimal(&raw.open),
        previous_close,
        week_52_range,
        pe_ratio: coerce_decimal_opt(&raw.pe_ratio),
        pb_ratio: coerce_decimal_opt(&raw.pb_ratio),
        dividend_yield: coerce_decimal_opt(&raw.dividend_yield),
        last_updated: timestamp_or_now(raw.timestamp),
        source: source.to_string(),
        symbol: raw.symbol,
    }
}

/// Builds the canonical index snapshot from one provider's raw payload.
pub fn normalize_index(raw: RawIndex, source: ProviderId) -> IndexSnapshot {
    let value = coerce_decimal(&raw.value);
    let (_, change, change_percent) = resolve_change(
        value,
        coerce_decimal_opt(&raw.previous_close),
        coerce_decimal_opt(&raw.change),
        coerce_decimal_opt(&raw.percent_change),
    );

    let name = raw
        .name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| index_info(&raw.symbol).map(|info| info.name.to_string()))
        .unwrap_or_else(|| raw.symbol.clone());

    IndexSnapshot {
        name,
        value,
        change,
        change_percent,
        volume: coerce_decimal_opt(&raw.volume),
        last_updated: timestamp_or_now(raw.timestamp),
        source: source.to_string(),
        symbol: raw.symbol,
    }
}

/// Resolves `(previous_close, change, change_percent)` from whatever subset
/// the provider sent, keeping the invariants consistent.
fn resolve_change(
    price: Decimal,
    previous_close: Option<Decimal>,
    change: Option<Decimal>,
    percent: Option<Decimal>,
) -> (Decimal, Decimal, Decimal) {
    match (previous_close, change, percent) {
        // Previous close wins; derived fields are recomputed from it.
        (Some(prev), _, _) => {
            let change = price - prev;
            (prev, change, percent_of(change, prev))
        }

        // Back previous close out of the absolute change.
        (None, Some(change), _) => {
            let prev = price - change;
            (prev, change, percent_of(change, prev))
        }

        // Only a percent: previous = price * 100 / (100 + pct). The
        // provider's percent is kept verbatim.
        (None, None, Some(pct)) => {
            let denom = Decimal::ONE_HUNDRED + pct;
            if denom.is_zero() {
                (price, Decimal::ZERO, Decimal::ZERO)
            } else {
                let prev = price * Decimal::ONE_HUNDRED / denom;
                (prev, price - prev, pct)
            }
        }

        // Nothing to go on: flat.
        (None, None, None) => (price, Decimal::ZERO, Decimal::ZERO),
    }
}

fn percent_of(change: Decimal, previous_close: Decimal) -> Decimal {
    if previous_close.is_zero() {
        Decimal::ZERO
    } else {
        (change / previous_close * Decimal::ONE_HUNDRED).round_dp(4)
    }
}

fn timestamp_or_now(unix_seconds: Option<i64>) -> DateTime<Utc> {
    unix_seconds
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_coerce_thousands_separator_string() {
        assert_eq!(coerce_decimal(&json!("1,234.56")), dec!(1234.56));
    }

    #[test]
    fn test_coerce_percent_string() {
        assert_eq!(coerce_decimal(&json!("-1.23%")), dec!(-1.23));
    }

    #[test]
    fn test_coerce_currency_symbol() {
        assert_eq!(coerce_decimal(&json!("₹2,456.75")), dec!(2456.75));
        assert_eq!(coerce_decimal(&json!("$99.10")), dec!(99.10));
    }

    #[test]
    fn test_coerce_plus_prefix_and_plain_number() {
        assert_eq!(coerce_decimal(&json!("+0.42")), dec!(0.42));
        assert_eq!(coerce_decimal(&json!(2456.75)), dec!(2456.75));
        assert_eq!(coerce_decimal(&json!(4_521_000)), dec!(4521000));
    }

    #[test]
    fn test_coerce_garbage_is_zero() {
        assert_eq!(coerce_decimal(&json!("not a number")), Decimal::ZERO);
        assert_eq!(coerce_decimal(&json!(true)), Decimal::ZERO);
        assert_eq!(coerce_decimal(&Value::Null), Decimal::ZERO);
    }

    #[test]
    fn test_optional_absent_markers_are_none() {
        assert_eq!(coerce_decimal_opt(&json!("N/A")), None);
        assert_eq!(coerce_decimal_opt(&json!("-")), None);
        assert_eq!(coerce_decimal_opt(&json!("")), None);
        assert_eq!(coerce_decimal_opt(&Value::Null), None);
        assert_eq!(coerce_decimal_opt(&json!("27.4")), Some(dec!(27.4)));
    }

    #[test]
    fn test_previous_close_is_ground_truth() {
        // Provider sent a contradictory change; it gets recomputed.
        let raw = RawQuote {
            price: json!(100),
            previous_close: json!(90),
            change: json!(5),
            ..RawQuote::for_symbol("TCS.NS")
        };
        let quote = normalize_quote(raw, "FINNHUB");
        assert_eq!(quote.change, dec!(10));
        assert_eq!(quote.change_percent, dec!(11.1111));
        assert_eq!(quote.previous_close, dec!(90));
    }

    #[test]
    fn test_percent_only_payload_keeps_percent_verbatim() {
        let raw = RawQuote {
            price: json!("1,234.56"),
            percent_change: json!("-1.23%"),
            ..RawQuote::for_symbol("INFY.NS")
        };
        let quote = normalize_quote(raw, "ALPHA_VANTAGE");
        assert_eq!(quote.price, dec!(1234.56));
        assert_eq!(quote.change_percent, dec!(-1.23));
        // Invariant: change == price - previous_close.
        assert_eq!(quote.change, quote.price - quote.previous_close);
        assert!(quote.change < Decimal::ZERO);
    }

    #[test]
    fn test_change_only_payload_backs_out_previous_close() {
        let raw = RawQuote {
            price: json!(205),
            change: json!(5),
            ..RawQuote::for_symbol("HDFCBANK.NS")
        };
        let quote = normalize_quote(raw, "FINNHUB");
        assert_eq!(quote.previous_close, dec!(200));
        assert_eq!(quote.change_percent, dec!(2.5));
    }

    #[test]
    fn test_zero_previous_close_means_zero_percent() {
        let raw = RawQuote {
            price: json!(10),
            previous_close: json!(0),
            ..RawQuote::for_symbol("NEWIPO.NS")
        };
        let quote = normalize_quote(raw, "FINNHUB");
        assert_eq!(quote.change_percent, Decimal::ZERO);
        assert_eq!(quote.change, dec!(10));
    }

    #[test]
    fn test_missing_optionals_stay_absent_not_zero() {
        let raw = RawQuote {
            price: json!(100),
            pe_ratio: json!("N/A"),
            ..RawQuote::for_symbol("TATASTEEL.NS")
        };
        let quote = normalize_quote(raw, "TWELVE_DATA");
        assert_eq!(quote.pe_ratio, None);
        assert_eq!(quote.pb_ratio, None);
        assert_eq!(quote.dividend_yield, None);
        // Required fields default to zero instead.
        assert_eq!(quote.volume, Decimal::ZERO);
    }

    #[test]
    fn test_exchange_inferred_from_symbol() {
        assert_eq!(exchange_from_symbol("RELIANCE.NS"), "NSE");
        assert_eq!(exchange_from_symbol("TCS.BO"), "BSE");
        assert_eq!(exchange_from_symbol("^NSEI"), "INDEX");

        let raw = RawQuote {
            price: json!(100),
            ..RawQuote::for_symbol("TCS.BO")
        };
        assert_eq!(normalize_quote(raw, "FINNHUB").exchange, "BSE");
    }

    #[test]
    fn test_name_falls_back_to_symbol() {
        let raw = RawQuote {
            price: json!(100),
            name: Some("  ".to_string()),
            ..RawQuote::for_symbol("WIPRO.NS")
        };
        assert_eq!(normalize_quote(raw, "FINNHUB").name, "WIPRO.NS");
    }

    #[test]
    fn test_normalize_index_uses_catalog_name() {
        let raw = RawIndex {
            value: json!("24,852.15"),
            previous_close: json!("24,700.00"),
            ..RawIndex::for_symbol("^NSEI")
        };
        let snapshot = normalize_index(raw, "TWELVE_DATA");
        assert_eq!(snapshot.name, "NIFTY 50");
        assert_eq!(snapshot.value, dec!(24852.15));
        assert_eq!(snapshot.change, dec!(152.15));
        assert_eq!(snapshot.volume, None);
    }

    #[test]
    fn test_timestamp_parsing() {
        let raw = RawQuote {
            price: json!(100),
            timestamp: Some(1_700_000_000),
            ..RawQuote::for_symbol("INFY.NS")
        };
        let quote = normalize_quote(raw, "FINNHUB");
        assert_eq!(quote.last_updated.timestamp(), 1_700_000_000);
    }
}
