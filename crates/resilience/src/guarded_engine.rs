//! Guarded calls - circuit breaker, bulkhead and retry around an operation
//!
//! [`run_guarded`] composes the three guards around any operation, and
//! [`GuardedEngine`] applies it to an [`EnginePort`]. Composition order per
//! call:
//!
//! 1. the circuit breaker is asked first, so an open circuit never queues;
//! 2. a bulkhead slot is acquired;
//! 3. retries run inside that slot;
//! 4. the final outcome is recorded once on the breaker.
//!
//! A call refused by the bulkhead, or dropped before it finishes, hands its
//! breaker admission and bulkhead slot back.
//!
//! Refusals come back as [`ApplicationError::Rejected`], which callers can
//! tell apart from a failed attempt with [`ApplicationError::is_rejection`].

use std::{fmt, future::Future, sync::Arc};

use application::{
    ApplicationError, EngineInput, EngineKind, EngineOutput, EnginePort, MetricsSource,
};
use async_trait::async_trait;
use domain::ResilienceMetric;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
    bulkhead::{Bulkhead, BulkheadConfig, BulkheadError},
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig},
    config::ResilienceConfig,
    retry::{RetryConfig, RetryEngine, RetryResult},
};

/// Why a guarded call never reached its operation
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GuardRejection {
    /// The circuit breaker refused the call
    #[error("circuit open")]
    CircuitOpen,

    /// No bulkhead slot could be acquired
    #[error(transparent)]
    Bulkhead(#[from] BulkheadError),
}

/// Runs `operation` behind `breaker`, then inside a `bulkhead` slot with
/// `retry` applied to errors `retry_if` accepts
///
/// The final outcome is recorded on the breaker once. A rejection or a
/// dropped call hands the breaker admission and the slot back.
pub async fn run_guarded<F, Fut, T, E, P>(
    breaker: &CircuitBreaker,
    bulkhead: &Bulkhead,
    retry: &RetryEngine,
    operation: F,
    retry_if: P,
) -> Result<RetryResult<T, E>, GuardRejection>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    P: Fn(&E) -> bool,
{
    let admission = breaker.admit().ok_or(GuardRejection::CircuitOpen)?;
    let outcome = bulkhead
        .run(|| retry.execute_when(operation, retry_if))
        .await?;
    if outcome.is_ok() {
        admission.success();
    } else {
        admission.failure();
    }
    Ok(outcome)
}

/// An [`EnginePort`] wrapped with circuit breaker, bulkhead and retry
pub struct GuardedEngine {
    inner: Arc<dyn EnginePort>,
    breaker: CircuitBreaker,
    bulkhead: Bulkhead,
    retry: RetryEngine,
}

impl fmt::Debug for GuardedEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedEngine")
            .field("kind", &self.inner.kind())
            .field("breaker", &self.breaker)
            .field("bulkhead", &self.bulkhead)
            .finish_non_exhaustive()
    }
}

impl GuardedEngine {
    /// Wrap `inner` with default guard configuration
    #[must_use]
    pub fn new(inner: Arc<dyn EnginePort>) -> Self {
        Self::with_config(
            inner,
            CircuitBreakerConfig::default(),
            BulkheadConfig::default(),
            RetryConfig::default(),
        )
    }

    /// Wrap `inner` with explicit guard configuration
    #[must_use]
    pub fn with_config(
        inner: Arc<dyn EnginePort>,
        breaker: CircuitBreakerConfig,
        bulkhead: BulkheadConfig,
        retry: RetryConfig,
    ) -> Self {
        let name = inner.kind().to_string();
        Self::from_parts(
            inner,
            CircuitBreaker::with_config(name.clone(), breaker),
            Bulkhead::with_config(name, bulkhead),
            RetryEngine::new(retry),
        )
    }

    /// Wrap `inner` using the guard tables of a loaded configuration
    #[must_use]
    pub fn from_config(inner: Arc<dyn EnginePort>, config: &ResilienceConfig) -> Self {
        Self::with_config(
            inner,
            config.circuit_breaker.clone(),
            config.bulkhead.clone(),
            config.retry.clone(),
        )
    }

    /// Assemble from prebuilt guards, e.g. a breaker on a test clock
    #[must_use]
    pub fn from_parts(
        inner: Arc<dyn EnginePort>,
        breaker: CircuitBreaker,
        bulkhead: Bulkhead,
        retry: RetryEngine,
    ) -> Self {
        Self {
            inner,
            breaker,
            bulkhead,
            retry,
        }
    }

    /// The circuit breaker guarding the engine
    #[must_use]
    pub const fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The bulkhead guarding the engine
    #[must_use]
    pub const fn bulkhead(&self) -> &Bulkhead {
        &self.bulkhead
    }
}

#[async_trait]
impl EnginePort for GuardedEngine {
    #[instrument(skip(self, input), fields(engine = %self.inner.kind(), target = %input.target))]
    async fn execute(&self, input: EngineInput) -> Result<EngineOutput, ApplicationError> {
        let outcome = run_guarded(
            &self.breaker,
            &self.bulkhead,
            &self.retry,
            || self.inner.execute(input.clone()),
            ApplicationError::is_retryable,
        )
        .await
        .map_err(|rejection| {
            debug!(reason = %rejection, "Engine call rejected");
            ApplicationError::Rejected(format!("{rejection} for {}", self.inner.kind()))
        })?;

        if let Err(err) = &outcome.result {
            debug!(error = %err, attempts = outcome.attempts, "Engine call failed");
        }
        outcome.result
    }

    fn kind(&self) -> EngineKind {
        self.inner.kind()
    }
}

impl MetricsSource for GuardedEngine {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let mut metrics = self.breaker.metrics();
        metrics.extend(self.bulkhead.metrics());
        metrics.extend(self.retry.metrics());
        metrics
    }
}
