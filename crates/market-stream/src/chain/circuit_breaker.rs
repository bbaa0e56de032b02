//! Per-provider circuit breaker.
//!
//! Keeps a repeatedly failing provider out of the fetch rotation for a
//! cooling-off period instead of burning its rate budget on requests
//! that are likely to fail again. Three states per provider:
//!
//! - **Closed**: normal operation, calls go through.
//! - **Open**: too many consecutive failures, calls are skipped.
//! - **HalfOpen**: cooling-off elapsed, probing with live calls.
//!
//! State is in-memory only and starts over on process restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_PROBE_SUCCESS_THRESHOLD: u32 = 2;

/// Circuit state for a single provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Tuning knobs for the breaker.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the circuit open.
    pub failure_threshold: u32,
    /// Cooling-off period before probing an open circuit.
    pub recovery_timeout: Duration,
    /// Successful probes required to close a half-open circuit.
    pub probe_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            probe_success_threshold: DEFAULT_PROBE_SUCCESS_THRESHOLD,
        }
    }
}

/// Breaker bookkeeping for one provider. All transitions live here so
/// the outer map wrapper stays a thin locking shell.
#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    probe_successes: u32,
    tripped_at: Option<Instant>,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            probe_successes: 0,
            tripped_at: None,
        }
    }

    /// Whether a call may go through now. Moves Open to HalfOpen once the
    /// cooling-off period has elapsed.
    fn admit(&mut self, provider: &str, config: &CircuitBreakerConfig) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled = self
                    .tripped_at
                    .is_some_and(|at| at.elapsed() >= config.recovery_timeout);
                if cooled {
                    info!("Circuit breaker: '{}' cooled off, probing in HalfOpen", provider);
                    self.state = CircuitState::HalfOpen;
                    self.probe_successes = 0;
                }
                cooled
            }
        }
    }

    fn on_success(&mut self, provider: &str, config: &CircuitBreakerConfig) {
        match self.state {
            CircuitState::Closed => {
                self.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                self.probe_successes += 1;
                debug!(
                    "Circuit breaker: probe success for '{}' ({}/{})",
                    provider, self.probe_successes, config.probe_success_threshold
                );
                if self.probe_successes >= config.probe_success_threshold {
                    info!("Circuit breaker: '{}' recovered, closing circuit", provider);
                    *self = Circuit::new();
                }
            }
            CircuitState::Open => {
                // A success can only land here if the caller bypassed admit.
                debug!("Circuit breaker: ignoring success for open circuit '{}'", provider);
            }
        }
    }

    fn on_failure(&mut self, provider: &str, config: &CircuitBreakerConfig) {
        self.consecutive_failures += 1;
        self.tripped_at = Some(Instant::now());

        match self.state {
            CircuitState::Closed => {
                if self.consecutive_failures >= config.failure_threshold {
                    info!(
                        "Circuit breaker: opening '{}' after {} consecutive failures",
                        provider, self.consecutive_failures
                    );
                    self.state = CircuitState::Open;
                } else {
                    debug!(
                        "Circuit breaker: failure for '{}' ({}/{})",
                        provider, self.consecutive_failures, config.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                info!("Circuit breaker: probe failed for '{}', reopening", provider);
                self.state = CircuitState::Open;
                self.probe_successes = 0;
            }
            CircuitState::Open => {}
        }
    }
}

/// Thread-safe circuit breaker covering every provider in the chain.
pub struct CircuitBreaker {
    circuits: Mutex<HashMap<String, Circuit>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Lock the circuit map, recovering from poison if necessary. Worst
    /// case after recovery is one mis-judged admission, not a panic.
    fn lock_circuits(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        self.circuits.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Check whether calls to `provider` are currently admitted.
    pub fn is_allowed(&self, provider: &str) -> bool {
        let mut circuits = self.lock_circuits();
        circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new)
            .admit(provider, &self.config)
    }

    /// Record a successful call for `provider`.
    pub fn record_success(&self, provider: &str) {
        let mut circuits = self.lock_circuits();
        circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new)
            .on_success(provider, &self.config);
    }

    /// Record a failed call for `provider`.
    pub fn record_failure(&self, provider: &str) {
        let mut circuits = self.lock_circuits();
        circuits
            .entry(provider.to_string())
            .or_insert_with(Circuit::new)
            .on_failure(provider, &self.config);
    }

    /// Current state for `provider`. Providers never seen are Closed.
    pub fn state(&self, provider: &str) -> CircuitState {
        let circuits = self.lock_circuits();
        circuits
            .get(provider)
            .map_or(CircuitState::Closed, |c| c.state)
    }

    /// Consecutive failure count for `provider`.
    pub fn failure_count(&self, provider: &str) -> u32 {
        let circuits = self.lock_circuits();
        circuits.get(provider).map_or(0, |c| c.consecutive_failures)
    }

    /// Force a single provider back to Closed.
    pub fn reset(&self, provider: &str) {
        let mut circuits = self.lock_circuits();
        if circuits.remove(provider).is_some() {
            info!("Circuit breaker: manually reset '{}'", provider);
        }
    }

    /// Forget every circuit.
    pub fn reset_all(&self) {
        let mut circuits = self.lock_circuits();
        circuits.clear();
        info!("Circuit breaker: all circuits reset");
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
