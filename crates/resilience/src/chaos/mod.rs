//! Chaos engineering: deterministic fault, latency and dependency injection
//!
//! Every probability roll goes through a [`SeededRng`](crate::rng::SeededRng)
//! owned by the injecting component, so two components built with the same
//! seed make the same decisions for the same call sequence.
//!
//! # Overview
//!
//! - [`FaultInjector`]: fails, times out or slows a wrapped operation
//! - [`LatencyInjector`]: sleeps for a random duration
//! - [`DependencyBreaker`]: marks named dependencies unavailable for a while
//! - [`ChaosOrchestrator`]: scenario-level "active fault" selector
//! - [`ChaosRunner`]: applies an ordered list of [`domain::ChaosAction`]s
//!
//! # Example
//!
//! ```ignore
//! use resilience::chaos::{FaultInjector, FaultInjectorConfig};
//!
//! let injector = FaultInjector::new(FaultInjectorConfig {
//!     enabled: true,
//!     fault_rate: 0.3,
//!     seed: Some(7),
//!     ..Default::default()
//! });
//! let result: Result<u32, InjectedError> = injector.apply(|| async { Ok(42) }).await;
//! ```

mod dependency_breaker;
mod fault_injector;
mod latency_injector;
mod orchestrator;
mod runner;

pub use dependency_breaker::{DependencyBreaker, DependencyBreakerConfig};
pub use fault_injector::{FaultInjector, FaultInjectorConfig, FaultMode};
pub use latency_injector::{LatencyInjector, LatencyInjectorConfig};
pub use orchestrator::{ChaosOrchestrator, ChaosOrchestratorConfig};
pub use runner::{ChaosRunner, ChaosRunnerConfig};

use application::ApplicationError;
use thiserror::Error;

/// Failures raised by chaos components
///
/// Callers are expected to convert these into their own error type through
/// `From`, so an injected failure looks like any other failure downstream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InjectedError {
    /// Simulated hard failure
    #[error("Injected failure: {0}")]
    Failure(String),

    /// Simulated deadline overrun
    #[error("Injected timeout after {0}ms")]
    Timeout(u64),

    /// Simulated unavailable dependency
    #[error("Dependency '{0}' is broken")]
    DependencyBroken(String),
}

impl From<InjectedError> for ApplicationError {
    fn from(err: InjectedError) -> Self {
        match err {
            InjectedError::Timeout(ms) => Self::Timeout(ms),
            other => Self::ExternalService(other.to_string()),
        }
    }
}
