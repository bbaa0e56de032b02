use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Canonical snapshot of one market index.
///
/// Same change/change-percent invariants as [`Quote`](super::Quote).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// Display name (e.g., "NIFTY 50")
    pub name: String,

    /// Canonical symbol (e.g., "^NSEI")
    pub symbol: String,

    /// Current index level
    pub value: Decimal,

    /// Absolute change versus previous close
    pub change: Decimal,

    /// Percent change versus previous close
    pub change_percent: Decimal,

    /// Traded volume, when the provider reports one for the index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,

    /// When this snapshot was produced
    pub last_updated: DateTime<Utc>,

    /// Source of the snapshot (TWELVE_DATA, FINNHUB, ALPHA_VANTAGE, SYNTHETIC)
    pub source: String,
}

/// One entry of the tracked-index catalog.
#[derive(Clone, Copy, Debug)]
pub struct IndexInfo {
    /// Display name
    pub name: &'static str,

    /// Canonical symbol; providers map this to their own notation
    pub symbol: &'static str,

    /// Rough current level, used to seed synthetic fallback values
    pub baseline: Decimal,
}

lazy_static! {
    /// The indices the dashboard tracks, in display order.
    pub static ref TRACKED_INDICES: Vec<IndexInfo> = vec![
        IndexInfo {
            name: "NIFTY 50",
            symbol: "^NSEI",
            baseline: Decimal::from(24_800),
        },
        IndexInfo {
            name: "SENSEX",
            symbol: "^BSESN",
            baseline: Decimal::from(81_300),
        },
        IndexInfo {
            name: "NIFTY BANK",
            symbol: "^NSEBANK",
            baseline: Decimal::from(51_200),
        },
    ];
}

/// Looks up a tracked index by its canonical symbol.
pub fn index_info(symbol: &str) -> Option<&'static IndexInfo> {
    TRACKED_INDICES.iter().find(|info| info.symbol == symbol)
}
