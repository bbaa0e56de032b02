/// Classification for chain fallthrough policy.
///
/// Used to determine how the provider chain should respond to errors from
/// individual providers.
///
/// # Behavior Summary
///
/// | Class | Try Next Provider? | Record Circuit Breaker Failure? |
/// |-------|-------------------|--------------------------------|
/// | `Never` | No | No |
/// | `FailoverWithPenalty` | Yes | Yes (affects future requests) |
/// | `NextProvider` | Yes | No |
/// | `CircuitOpen` | Yes (skip this one) | No (already recorded) |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never continue - the chain has nothing left to try.
    /// Only the exhaustion signal classifies here.
    Never,

    /// Failover to the next provider and record a circuit breaker penalty.
    ///
    /// Used for genuine upstream failures: transport errors and malformed
    /// payloads. Enough of these in a row opens the provider's circuit and
    /// temporarily excludes it from the chain, which is the only
    /// provider-level backoff this layer applies. Per-tick retry backoff
    /// belongs to the subscription layer, not here.
    FailoverWithPenalty,

    /// Try the next provider without recording any penalty.
    ///
    /// Used when the provider was never actually reached (local budget
    /// denial) or cannot handle the operation at all. Says nothing about
    /// provider health, so the circuit breaker is left alone.
    NextProvider,

    /// Circuit breaker is open for this provider.
    /// Skip this provider until the circuit closes.
    CircuitOpen,
}
