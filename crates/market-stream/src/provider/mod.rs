//! Upstream market data providers
//!
//! This module contains the provider abstraction and the concrete sources:
//! - `traits` - The QuoteProvider trait all sources implement
//! - `payload` - Raw payload shapes handed to the normalizer (RawQuote, RawIndex)
//! - `twelve_data` - Twelve Data, the primary NSE/BSE source (8 calls/min)
//! - `finnhub` - Finnhub, the secondary source (60 calls/min)
//! - `alpha_vantage` - Alpha Vantage, last-resort quotes via BSE (5 calls/min)

mod alpha_vantage;
mod finnhub;
mod payload;
mod traits;
mod twelve_data;

pub use alpha_vantage::AlphaVantageProvider;
pub use finnhub::FinnhubProvider;
pub use payload::{RawIndex, RawQuote};
pub use traits::QuoteProvider;
pub use twelve_data::TwelveDataProvider;

use std::env;
use std::sync::Arc;

use log::{debug, warn};

/// Environment variable holding the Twelve Data API key.
pub const TWELVE_DATA_KEY_VAR: &str = "TWELVE_DATA_API_KEY";
/// Environment variable holding the Finnhub API key.
pub const FINNHUB_KEY_VAR: &str = "FINNHUB_API_KEY";
/// Environment variable holding the Alpha Vantage API key.
pub const ALPHA_VANTAGE_KEY_VAR: &str = "ALPHA_VANTAGE_API_KEY";

/// Builds the default chain order from environment configuration.
///
/// The order is fixed: Twelve Data, then Finnhub, then Alpha Vantage.
/// Providers whose key is unset or blank are skipped with a warning, so a
/// deployment with a single key still gets a working, shorter chain.
pub fn providers_from_env() -> Vec<Arc<dyn QuoteProvider>> {
    let mut providers: Vec<Arc<dyn QuoteProvider>> = Vec::new();

    match non_empty_var(TWELVE_DATA_KEY_VAR) {
        Some(key) => providers.push(Arc::new(TwelveDataProvider::new(key))),
        None => warn!("{} not set, skipping Twelve Data", TWELVE_DATA_KEY_VAR),
    }
    match non_empty_var(FINNHUB_KEY_VAR) {
        Some(key) => providers.push(Arc::new(FinnhubProvider::new(key))),
        None => warn!("{} not set, skipping Finnhub", FINNHUB_KEY_VAR),
    }
    match non_empty_var(ALPHA_VANTAGE_KEY_VAR) {
        Some(key) => providers.push(Arc::new(AlphaVantageProvider::new(key))),
        None => warn!("{} not set, skipping Alpha Vantage", ALPHA_VANTAGE_KEY_VAR),
    }

    debug!("Configured {} providers from environment", providers.len());
    providers
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_providers_from_env_keeps_configured_order() {
        env::set_var(TWELVE_DATA_KEY_VAR, "td-key");
        env::set_var(FINNHUB_KEY_VAR, "fh-key");
        env::set_var(ALPHA_VANTAGE_KEY_VAR, "av-key");

        let providers = providers_from_env();
        let ids: Vec<&str> = providers.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["TWELVE_DATA", "FINNHUB", "ALPHA_VANTAGE"]);
    }
}
