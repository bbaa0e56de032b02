//! Provider chain module.
//!
//! Orchestration for the upstream providers:
//! - Strict-priority fallthrough across providers
//! - Per-provider call pacing and circuit breaking
//! - Response caching keyed by request
//! - Synthetic last-resort data when the chain is exhausted

mod circuit_breaker;
mod fallback;
mod provider_chain;
mod rate_limiter;
mod response_cache;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use fallback::{synthetic_indices, synthetic_quote, synthetic_quotes, SYNTHETIC_SOURCE};
pub use provider_chain::{ChainFetch, DataOrigin, ProviderChain};
pub use rate_limiter::RateLimiter;
pub use response_cache::ResponseCache;
