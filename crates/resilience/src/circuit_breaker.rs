//! Circuit breaker pattern for guarded dependencies
//!
//! Fails fast while a dependency is known to be unhealthy.
//!
//! # States
//!
//! - **Closed**: Normal operation, calls pass through
//! - **Open**: Dependency is failing, calls are rejected without running
//! - **Half-Open**: A limited number of probe calls test for recovery
//!
//! The open to half-open transition is lazy: it happens on the first
//! [`CircuitBreaker::allow`] or [`CircuitBreaker::state`] call after the open
//! window has elapsed, never on a timer. A circuit that sees no traffic stays
//! logically open.
//!
//! # Example
//!
//! ```rust,ignore
//! use resilience::CircuitBreaker;
//!
//! let cb = CircuitBreaker::new("billing");
//! let result = cb.call(|| async { billing.charge().await }).await;
//! ```

use std::{fmt, future::Future, sync::Arc};

use application::{Clock, MetricsSource};
use domain::{CircuitState, MetricUnit, ResilienceMetric};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::system_clock;

/// Configuration for a circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures while closed before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Successful half-open probes needed to close the circuit
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// How long the circuit stays open, in milliseconds
    #[serde(default = "default_open_duration_ms")]
    pub open_duration_ms: u64,

    /// Probe calls admitted while half-open
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: u32,
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_success_threshold() -> u32 {
    3
}

const fn default_open_duration_ms() -> u64 {
    30_000
}

const fn default_half_open_max_calls() -> u32 {
    3
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            open_duration_ms: default_open_duration_ms(),
            half_open_max_calls: default_half_open_max_calls(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Configuration for a sensitive dependency (trips early, probes soon)
    #[must_use]
    pub const fn sensitive() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 1,
            open_duration_ms: 10_000,
            half_open_max_calls: 1,
        }
    }

    /// Configuration for a flaky but tolerable dependency
    #[must_use]
    pub const fn resilient() -> Self {
        Self {
            failure_threshold: 10,
            success_threshold: 3,
            open_duration_ms: 60_000,
            half_open_max_calls: 5,
        }
    }
}

/// Error returned when the circuit is open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitOpenError {
    /// Name of the guarded dependency
    pub service_name: String,
}

impl std::error::Error for CircuitOpenError {}

impl fmt::Display for CircuitOpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Circuit breaker open for service '{}': service is temporarily unavailable",
            self.service_name
        )
    }
}

/// Error type for [`CircuitBreaker::call`]
#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    /// The circuit rejected the call; the operation never ran
    CircuitOpen(CircuitOpenError),
    /// The operation ran and failed
    ServiceError(E),
}

impl<E: fmt::Display> fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen(e) => write!(f, "{e}"),
            Self::ServiceError(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CircuitBreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CircuitOpen(e) => Some(e),
            Self::ServiceError(e) => Some(e),
        }
    }
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if this is a circuit open error
    #[must_use]
    pub const fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen(_))
    }

    /// Returns true if this is a service error
    #[must_use]
    pub const fn is_service_error(&self) -> bool {
        matches!(self, Self::ServiceError(_))
    }

    /// Converts the inner service error if present
    #[must_use]
    pub fn into_service_error(self) -> Option<E> {
        match self {
            Self::ServiceError(e) => Some(e),
            Self::CircuitOpen(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct CircuitBreakerState {
    state: CircuitState,
    failures: u32,
    successes: u32,
    open_until_ms: u64,
    half_open_calls: u32,
    trips: u64,
    recoveries: u64,
    rejected: u64,
}

/// Per-dependency fail-fast gate
///
/// Every call admitted by [`allow`](Self::allow) must be paired with exactly
/// one [`record_success`](Self::record_success) or
/// [`record_failure`](Self::record_failure).
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CircuitBreakerState>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Creates a circuit breaker with default configuration
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    /// Creates a circuit breaker with custom configuration
    #[must_use]
    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            clock: system_clock(),
            state: Mutex::new(CircuitBreakerState::default()),
        }
    }

    /// Replaces the time source
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the name of this circuit breaker
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration
    #[must_use]
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn refresh(&self, state: &mut CircuitBreakerState) {
        if state.state == CircuitState::Open && self.clock.now_ms() >= state.open_until_ms {
            debug!(
                service = %self.name,
                "Circuit transitioning from Open to HalfOpen"
            );
            state.state = CircuitState::HalfOpen;
            state.half_open_calls = 0;
            state.successes = 0;
        }
    }

    fn trip(&self, state: &mut CircuitBreakerState) {
        state.state = CircuitState::Open;
        state.open_until_ms = self
            .clock
            .now_ms()
            .saturating_add(self.config.open_duration_ms);
        state.trips += 1;
    }

    /// Returns the current state, applying the lazy open to half-open transition
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let mut state = self.state.lock();
        self.refresh(&mut state);
        state.state
    }

    /// Returns true if the circuit is closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// Returns true if the circuit is open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Whether a call may proceed
    ///
    /// While half-open, each admitted call consumes one probe slot.
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock();
        self.refresh(&mut state);
        match state.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen if state.half_open_calls < self.config.half_open_max_calls => {
                state.half_open_calls += 1;
                true
            },
            CircuitState::HalfOpen | CircuitState::Open => {
                state.rejected += 1;
                false
            },
        }
    }

    /// Records a successful call
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        match state.state {
            CircuitState::HalfOpen => {
                state.successes += 1;
                if state.successes >= self.config.success_threshold {
                    info!(
                        service = %self.name,
                        successes = state.successes,
                        "Circuit transitioning from HalfOpen to Closed"
                    );
                    state.state = CircuitState::Closed;
                    state.failures = 0;
                    state.successes = 0;
                    state.recoveries += 1;
                }
            },
            CircuitState::Closed => state.failures = 0,
            CircuitState::Open => {},
        }
    }

    /// Records a failed call
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        match state.state {
            CircuitState::HalfOpen => {
                warn!(
                    service = %self.name,
                    "Circuit transitioning from HalfOpen to Open after failure"
                );
                self.trip(&mut state);
            },
            CircuitState::Closed => {
                state.failures += 1;
                if state.failures >= self.config.failure_threshold {
                    warn!(
                        service = %self.name,
                        failures = state.failures,
                        "Circuit transitioning from Closed to Open"
                    );
                    state.failures = 0;
                    self.trip(&mut state);
                }
            },
            CircuitState::Open => {},
        }
    }

    /// Gives back an admission that never reached the dependency
    ///
    /// Use when a call passed [`allow`](Self::allow) but was then refused
    /// downstream (a full bulkhead, say). While half-open this frees the
    /// probe slot so the circuit can still be probed.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        if state.state == CircuitState::HalfOpen {
            state.half_open_calls = state.half_open_calls.saturating_sub(1);
        }
    }

    /// Admits one call, returning a guard that must report its outcome
    ///
    /// Dropping the guard without reporting (a cancelled caller, a refusal
    /// further down) gives the admission back through [`cancel`](Self::cancel).
    pub fn admit(&self) -> Option<Admission<'_>> {
        if !self.allow() {
            return None;
        }
        Some(Admission {
            breaker: self,
            settled: false,
        })
    }

    /// Calls an async operation through the circuit breaker
    ///
    /// Returns [`CircuitBreakerError::CircuitOpen`] without running the
    /// operation when the circuit rejects the call.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Debug,
    {
        let Some(admission) = self.admit() else {
            debug!(service = %self.name, "Circuit breaker preventing call to service");
            return Err(CircuitBreakerError::CircuitOpen(CircuitOpenError {
                service_name: self.name.clone(),
            }));
        };

        match f().await {
            Ok(result) => {
                admission.success();
                Ok(result)
            },
            Err(e) => {
                debug!(service = %self.name, error = ?e, "Service call failed");
                admission.failure();
                Err(CircuitBreakerError::ServiceError(e))
            },
        }
    }
}

/// One admitted call; cancelled on drop unless its outcome was recorded
#[derive(Debug)]
#[must_use = "dropping an admission cancels it"]
pub struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl Admission<'_> {
    /// Records the call as successful
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    /// Records the call as failed
    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.cancel();
        }
    }
}

impl MetricsSource for CircuitBreaker {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let mut state = self.state.lock();
        self.refresh(&mut state);
        vec![
            ResilienceMetric::new(
                "circuit_breaker.state",
                f64::from(state.state.metric_value()),
                MetricUnit::Enum,
            ),
            ResilienceMetric::count("circuit_breaker.trips", state.trips),
            ResilienceMetric::count("circuit_breaker.recoveries", state.recoveries),
            ResilienceMetric::count("circuit_breaker.rejected", state.rejected),
        ]
    }
}
