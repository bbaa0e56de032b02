//! Error types and retry classification for the market stream crate.
//!
//! This module provides:
//! - [`StreamError`]: The main error enum for all streaming operations
//! - [`RetryClass`]: Classification for determining chain fallthrough behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur while fetching or streaming market data.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines how the provider chain should handle the error.
///
/// All variants carry owned strings rather than source errors so that values
/// stay `Clone` and can be delivered over subscription event channels.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The per-provider call budget denied this request.
    /// The chain moves on to the next provider; nothing is wrong upstream.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider whose budget was exhausted
        provider: String,
    },

    /// A network or HTTP failure while talking to a provider.
    /// The chain advances and the provider's circuit breaker records a failure.
    #[error("Transport error: {provider} - {message}")]
    Transport {
        /// The provider that failed
        provider: String,
        /// HTTP status when the request got far enough to receive one
        status: Option<u16>,
        /// Human-readable failure description
        message: String,
    },

    /// The provider answered but the payload did not have the expected shape.
    /// Handled like a transport failure, logged distinctly.
    #[error("Malformed response: {provider} - {message}")]
    MalformedResponse {
        /// The provider that returned the payload
        provider: String,
        /// What was wrong with it
        message: String,
    },

    /// The circuit breaker is open for this provider.
    /// Skip this provider until the circuit closes.
    #[error("Circuit open: {provider}")]
    CircuitOpen {
        /// The provider with an open circuit
        provider: String,
    },

    /// The provider does not implement the requested operation.
    /// Try the next provider in the chain.
    #[error("Not supported by {provider}: {operation}")]
    NotSupported {
        /// The provider that was asked
        provider: String,
        /// The operation it cannot perform
        operation: String,
    },

    /// Every provider in the chain was tried and none produced data.
    /// Terminal within the chain; the fetch paths convert it into a tagged
    /// synthetic result instead of returning it as a hard failure.
    #[error("All providers exhausted for {request}: {detail}")]
    UpstreamExhausted {
        /// Description of the request that failed
        request: String,
        /// Per-provider failure summary
        detail: String,
    },
}

impl StreamError {
    /// Returns the retry classification for this error.
    ///
    /// This classification determines how the provider chain should handle the error:
    ///
    /// - [`RetryClass::Never`]: Don't continue, the error is terminal
    /// - [`RetryClass::FailoverWithPenalty`]: Try the next provider and record a
    ///   circuit breaker failure for this one
    /// - [`RetryClass::NextProvider`]: Try the next provider, no penalty
    /// - [`RetryClass::CircuitOpen`]: Provider circuit is open, skip it
    ///
    /// # Examples
    ///
    /// ```
    /// use finboard_market_stream::errors::{RetryClass, StreamError};
    ///
    /// let error = StreamError::RateLimited { provider: "FINNHUB".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::NextProvider);
    ///
    /// let error = StreamError::Transport {
    ///     provider: "TWELVE_DATA".to_string(),
    ///     status: Some(502),
    ///     message: "HTTP 502".to_string(),
    /// };
    /// assert_eq!(error.retry_class(), RetryClass::FailoverWithPenalty);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Our own admission gate said no. The provider is healthy as far
            // as we know, so no circuit breaker penalty.
            Self::RateLimited { .. } | Self::NotSupported { .. } => RetryClass::NextProvider,

            // Upstream actually misbehaved - count it against the circuit.
            Self::Transport { .. } | Self::MalformedResponse { .. } => {
                RetryClass::FailoverWithPenalty
            }

            // Circuit breaker open
            Self::CircuitOpen { .. } => RetryClass::CircuitOpen,

            // Exhausted all options - terminal
            Self::UpstreamExhausted { .. } => RetryClass::Never,
        }
    }

    /// The provider this error is attributed to, when there is one.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::RateLimited { provider }
            | Self::Transport { provider, .. }
            | Self::MalformedResponse { provider, .. }
            | Self::CircuitOpen { provider }
            | Self::NotSupported { provider, .. } => Some(provider),
            Self::UpstreamExhausted { .. } => None,
        }
    }
}
