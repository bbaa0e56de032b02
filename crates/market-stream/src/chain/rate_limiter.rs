//! Call pacing for upstream market data providers.
//!
//! Enforces a minimum interval between successive calls to the same
//! provider, derived from the provider's advertised per-minute budget.
//! The availability check and the timestamp update happen under a single
//! lock acquisition, so two racing tasks can never both slip through the
//! same gap in the window.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};

const MILLIS_PER_MINUTE: u64 = 60_000;

/// Minimum spacing between calls for a given per-minute budget.
fn min_interval(calls_per_minute: u32) -> Duration {
    Duration::from_millis(MILLIS_PER_MINUTE / u64::from(calls_per_minute))
}

/// Per-provider call spacing gate.
///
/// Tracks the instant of the last granted call per provider. A call is
/// granted when no previous call is recorded or when the minimum interval
/// for the provider's budget has fully elapsed. Denied calls leave the
/// recorded timestamp untouched, so a burst of denied attempts cannot
/// push the window further out.
pub struct RateLimiter {
    /// Instant of the last granted call, keyed by provider id.
    last_call: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            last_call: Mutex::new(HashMap::new()),
        }
    }

    /// Lock the timestamp map, recovering from poison if necessary.
    ///
    /// The map only holds monotonic timestamps, so recovering a poisoned
    /// lock can at worst mis-pace a single call.
    fn lock_last_call(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.last_call.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter timestamp mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Check whether a call to `provider` is allowed right now and, if so,
    /// record it in the same critical section.
    ///
    /// Returns `true` when the call may proceed. A budget of zero calls
    /// per minute always denies.
    pub fn allow(&self, provider: &str, calls_per_minute: u32) -> bool {
        if calls_per_minute == 0 {
            return false;
        }

        let interval = min_interval(calls_per_minute);
        let now = Instant::now();
        let mut last_call = self.lock_last_call();

        match last_call.get(provider) {
            Some(last) if now.duration_since(*last) < interval => {
                debug!("Rate limiter: call to '{}' denied, window not elapsed", provider);
                false
            }
            _ => {
                last_call.insert(provider.to_string(), now);
                debug!("Rate limiter: call to '{}' granted", provider);
                true
            }
        }
    }

    /// Time remaining until the next call to `provider` would be granted.
    ///
    /// Returns `Duration::ZERO` when a call would be allowed immediately.
    /// Does not mutate any state.
    pub fn next_allowed_in(&self, provider: &str, calls_per_minute: u32) -> Duration {
        if calls_per_minute == 0 {
            return Duration::MAX;
        }

        let interval = min_interval(calls_per_minute);
        let last_call = self.lock_last_call();

        match last_call.get(provider) {
            Some(last) => interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Forget the recorded timestamp for a provider.
    pub fn reset(&self, provider: &str) {
        let mut last_call = self.lock_last_call();
        last_call.remove(provider);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rewind the recorded timestamp for a provider by `delta`, simulating
    /// elapsed time without sleeping.
    fn rewind(limiter: &RateLimiter, provider: &str, delta: Duration) {
        let mut last_call = limiter.last_call.lock().unwrap();
        if let Some(stamp) = last_call.get_mut(provider) {
            *stamp = Instant::now() - delta;
        }
    }

    #[test]
    fn test_first_call_is_granted() {
        let limiter = RateLimiter::new();
        assert!(limiter.allow("fresh", 60));
    }

    #[test]
    fn test_immediate_second_call_is_denied() {
        let limiter = RateLimiter::new();
        assert!(limiter.allow("paced", 60));
        assert!(!limiter.allow("paced", 60));
    }

    #[test]
    fn test_call_granted_after_window_elapses() {
        let limiter = RateLimiter::new();
        assert!(limiter.allow("paced", 60));

        // 60 calls/minute means a 1s window; rewind past it.
        rewind(&limiter, "paced", Duration::from_millis(1_001));
        assert!(limiter.allow("paced", 60));
    }

    #[test]
    fn test_denied_call_does_not_extend_window() {
        let limiter = RateLimiter::new();
        assert!(limiter.allow("paced", 60));

        let before = limiter.next_allowed_in("paced", 60);
        assert!(!limiter.allow("paced", 60));
        let after = limiter.next_allowed_in("paced", 60);

        // A re-stamped timestamp would reset the wait to the full window.
        assert!(after <= before);
        assert!(after > Duration::ZERO);
    }

    #[test]
    fn test_interval_derived_from_budget() {
        let limiter = RateLimiter::new();
        assert!(limiter.allow("slow", 5));

        // 5 calls/minute means a 12s window.
        let remaining = limiter.next_allowed_in("slow", 5);
        assert!(remaining > Duration::from_millis(11_900));
        assert!(remaining <= Duration::from_millis(12_000));
    }

    #[test]
    fn test_per_provider_isolation() {
        let limiter = RateLimiter::new();
        assert!(limiter.allow("first", 60));
        assert!(!limiter.allow("first", 60));

        // A saturated window on one provider never blocks another.
        assert!(limiter.allow("second", 60));
    }

    #[test]
    fn test_zero_budget_always_denies() {
        let limiter = RateLimiter::new();
        assert!(!limiter.allow("disabled", 0));
        assert_eq!(limiter.next_allowed_in("disabled", 0), Duration::MAX);
    }

    #[test]
    fn test_reset_clears_window() {
        let limiter = RateLimiter::new();
        assert!(limiter.allow("paced", 60));
        assert!(!limiter.allow("paced", 60));

        limiter.reset("paced");
        assert!(limiter.allow("paced", 60));
    }

    #[test]
    fn test_next_allowed_is_zero_for_unknown_provider() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.next_allowed_in("never-seen", 60), Duration::ZERO);
    }
}
