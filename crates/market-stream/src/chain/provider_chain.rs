//! Provider chain orchestration.
//!
//! Tries providers strictly in registration order, gated per provider by
//! the circuit breaker and the call-pacing limiter. The first provider to
//! produce a payload wins and its result is normalized and tagged with
//! its origin. When the whole chain comes up empty, the fetch paths
//! degrade to synthetic data instead of failing: the dashboard always has
//! something to render, and the attached [`StreamError`] tells observers
//! exactly what went wrong upstream.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use super::fallback::{synthetic_indices, synthetic_quote, synthetic_quotes};
use super::{CircuitBreaker, RateLimiter};
use crate::errors::{RetryClass, StreamError};
use crate::models::{IndexSnapshot, ProviderId, Quote, SymbolMatch};
use crate::normalize::{normalize_index, normalize_quote};
use crate::provider::QuoteProvider;

/// Where a delivered payload came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    /// Live data from the named provider.
    Provider(ProviderId),
    /// Synthetic data generated after the chain was exhausted.
    Fallback,
    /// A still-fresh payload served from the response cache.
    Cache,
}

impl DataOrigin {
    /// True for live provider data, false for cached or synthetic.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}

/// Outcome of one trip through the chain.
///
/// Fetches always carry data. When `origin` is [`DataOrigin::Fallback`]
/// the data is synthetic and `failure` holds the exhaustion error that
/// forced the degradation.
#[derive(Clone, Debug)]
pub struct ChainFetch<T> {
    pub data: T,
    pub origin: DataOrigin,
    pub failure: Option<StreamError>,
}

impl<T> ChainFetch<T> {
    fn live(data: T, provider: ProviderId) -> Self {
        Self {
            data,
            origin: DataOrigin::Provider(provider),
            failure: None,
        }
    }

    fn degraded(data: T, failure: StreamError) -> Self {
        Self {
            data,
            origin: DataOrigin::Fallback,
            failure: Some(failure),
        }
    }
}

/// Strict-priority chain over the configured providers.
///
/// Registration order is priority order. Each attempt runs through the
/// same admission gates before the provider is called:
///
/// 1. Circuit breaker must admit the provider.
/// 2. The rate limiter must have budget for it.
///
/// Failures are classified by [`StreamError::retry_class`]: upstream
/// misbehavior counts against the provider's circuit, local budget
/// denials and unsupported operations do not.
pub struct ProviderChain {
    providers: Vec<Arc<dyn QuoteProvider>>,
    rate_limiter: RateLimiter,
    circuit_breaker: CircuitBreaker,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn QuoteProvider>>) -> Self {
        Self::with_components(providers, RateLimiter::new(), CircuitBreaker::new())
    }

    /// Build a chain with injected gate components.
    pub fn with_components(
        providers: Vec<Arc<dyn QuoteProvider>>,
        rate_limiter: RateLimiter,
        circuit_breaker: CircuitBreaker,
    ) -> Self {
        Self {
            providers,
            rate_limiter,
            circuit_breaker,
        }
    }

    /// The configured providers, in priority order.
    pub fn providers(&self) -> &[Arc<dyn QuoteProvider>] {
        &self.providers
    }

    /// Whether the circuit for `provider` is currently refusing calls.
    pub fn is_circuit_open(&self, provider: &str) -> bool {
        !self.circuit_breaker.is_allowed(provider)
    }

    /// Force a provider's circuit back to closed.
    pub fn reset_circuit(&self, provider: &str) {
        self.circuit_breaker.reset(provider);
        self.rate_limiter.reset(provider);
    }

    /// Run the admission gates for one provider. Returns the skip note
    /// when the provider must not be called right now.
    fn admission_note(&self, provider: &Arc<dyn QuoteProvider>) -> Option<String> {
        let id = provider.id();

        if !self.circuit_breaker.is_allowed(id) {
            debug!("Chain: circuit open for '{}', skipping", id);
            return Some(format!("{}: circuit open", id));
        }

        if !self.rate_limiter.allow(id, provider.calls_per_minute()) {
            debug!("Chain: local call budget exhausted for '{}', skipping", id);
            return Some(format!("{}: call budget exhausted", id));
        }

        None
    }

    /// Record a provider failure against its circuit when the error class
    /// calls for a penalty.
    fn apply_retry_penalty(&self, provider: &str, error: &StreamError) {
        if error.retry_class() == RetryClass::FailoverWithPenalty {
            self.circuit_breaker.record_failure(provider);
        }
    }

    /// Fetch one quote, degrading to a synthetic quote when every
    /// provider fails.
    pub async fn fetch_quote(&self, symbol: &str) -> ChainFetch<Quote> {
        let mut attempts = Vec::new();

        for provider in &self.providers {
            if let Some(note) = self.admission_note(provider) {
                attempts.push(note);
                continue;
            }

            let id = provider.id();
            match provider.fetch_quote(symbol).await {
                Ok(raw) => {
                    self.circuit_breaker.record_success(id);
                    info!("Chain: quote for {} served by '{}'", symbol, id);
                    return ChainFetch::live(normalize_quote(raw, id), id);
                }
                Err(error) => {
                    warn!("Chain: '{}' failed quote for {}: {}", id, symbol, error);
                    self.apply_retry_penalty(id, &error);
                    attempts.push(format!("{}: {}", id, error));
                }
            }
        }

        let failure = StreamError::UpstreamExhausted {
            request: format!("quote {}", symbol),
            detail: summarize_attempts(attempts),
        };
        warn!("Chain: {}, serving synthetic quote", failure);
        ChainFetch::degraded(synthetic_quote(symbol), failure)
    }

    /// Fetch a batch of quotes, degrading to synthetic quotes when every
    /// provider fails. An empty batch resolves immediately without
    /// touching any provider.
    pub async fn fetch_quotes(&self, symbols: &[String]) -> ChainFetch<Vec<Quote>> {
        if symbols.is_empty() {
            debug!("Chain: empty quote batch, nothing to fetch");
            return ChainFetch {
                data: Vec::new(),
                origin: DataOrigin::Fallback,
                failure: None,
            };
        }

        let mut attempts = Vec::new();

        for provider in &self.providers {
            if let Some(note) = self.admission_note(provider) {
                attempts.push(note);
                continue;
            }

            let id = provider.id();
            match provider.fetch_quotes(symbols).await {
                Ok(raw) => {
                    self.circuit_breaker.record_success(id);
                    info!(
                        "Chain: {} of {} quotes served by '{}'",
                        raw.len(),
                        symbols.len(),
                        id
                    );
                    let quotes = raw
                        .into_iter()
                        .map(|quote| normalize_quote(quote, id))
                        .collect();
                    return ChainFetch::live(quotes, id);
                }
                Err(error) => {
                    warn!(
                        "Chain: '{}' failed quote batch of {}: {}",
                        id,
                        symbols.len(),
                        error
                    );
                    self.apply_retry_penalty(id, &error);
                    attempts.push(format!("{}: {}", id, error));
                }
            }
        }

        let failure = StreamError::UpstreamExhausted {
            request: format!("quotes {}", symbols.join(",")),
            detail: summarize_attempts(attempts),
        };
        warn!("Chain: {}, serving synthetic quotes", failure);
        ChainFetch::degraded(synthetic_quotes(symbols), failure)
    }

    /// Fetch the tracked indices, degrading to catalog-anchored synthetic
    /// snapshots when every provider fails.
    pub async fn fetch_indices(&self) -> ChainFetch<Vec<IndexSnapshot>> {
        let mut attempts = Vec::new();

        for provider in &self.providers {
            if let Some(note) = self.admission_note(provider) {
                attempts.push(note);
                continue;
            }

            let id = provider.id();
            match provider.fetch_indices().await {
                Ok(raw) => {
                    self.circuit_breaker.record_success(id);
                    info!("Chain: {} index snapshots served by '{}'", raw.len(), id);
                    let snapshots = raw
                        .into_iter()
                        .map(|index| normalize_index(index, id))
                        .collect();
                    return ChainFetch::live(snapshots, id);
                }
                Err(error) => {
                    warn!("Chain: '{}' failed indices: {}", id, error);
                    self.apply_retry_penalty(id, &error);
                    attempts.push(format!("{}: {}", id, error));
                }
            }
        }

        let failure = StreamError::UpstreamExhausted {
            request: "indices".to_string(),
            detail: summarize_attempts(attempts),
        };
        warn!("Chain: {}, serving synthetic indices", failure);
        ChainFetch::degraded(synthetic_indices(), failure)
    }

    /// Search for symbols across the chain.
    ///
    /// Search is a one-shot interactive operation with no meaningful
    /// synthetic stand-in, so unlike the fetch paths it surfaces
    /// exhaustion as an error.
    pub async fn search(&self, query: &str) -> Result<Vec<SymbolMatch>, StreamError> {
        let mut attempts = Vec::new();

        for provider in &self.providers {
            if let Some(note) = self.admission_note(provider) {
                attempts.push(note);
                continue;
            }

            let id = provider.id();
            match provider.search(query).await {
                Ok(matches) => {
                    self.circuit_breaker.record_success(id);
                    info!(
                        "Chain: {} search matches for {:?} from '{}'",
                        matches.len(),
                        query,
                        id
                    );
                    return Ok(matches);
                }
                Err(error) => {
                    debug!("Chain: '{}' failed search for {:?}: {}", id, query, error);
                    self.apply_retry_penalty(id, &error);
                    attempts.push(format!("{}: {}", id, error));
                }
            }
        }

        Err(StreamError::UpstreamExhausted {
            request: format!("search {:?}", query),
            detail: summarize_attempts(attempts),
        })
    }
}

fn summarize_attempts(attempts: Vec<String>) -> String {
    if attempts.is_empty() {
        "no providers configured".to_string()
    } else {
        attempts.join("; ")
    }
}
