//! Failure simulator - wraps calls to named dependencies with chaos
//!
//! Per call: the dependency breaker is consulted first, then latency is
//! injected, then the fault injector decides whether the call itself fails.

use std::{future::Future, sync::Arc};

use application::{Clock, MetricsSource};
use domain::ResilienceMetric;
use resilience::{
    chaos::{
        DependencyBreaker, DependencyBreakerConfig, FaultInjector, FaultInjectorConfig,
        InjectedError, LatencyInjector, LatencyInjectorConfig,
    },
    system_clock,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for a [`FailureSimulator`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureSimulatorConfig {
    /// Chance a call fails outright
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,

    /// Chance a call is delayed
    #[serde(default = "default_latency_rate")]
    pub latency_rate: f64,

    /// Chance a call breaks its dependency for a while
    #[serde(default)]
    pub dependency_break_rate: f64,

    /// How long a break lasts, in milliseconds
    #[serde(default = "default_break_duration_ms")]
    pub break_duration_ms: u64,

    /// Seed shared by every roll; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

const fn default_failure_rate() -> f64 {
    0.1
}

const fn default_latency_rate() -> f64 {
    0.2
}

const fn default_break_duration_ms() -> u64 {
    10_000
}

impl Default for FailureSimulatorConfig {
    fn default() -> Self {
        Self {
            failure_rate: default_failure_rate(),
            latency_rate: default_latency_rate(),
            dependency_break_rate: 0.0,
            break_duration_ms: default_break_duration_ms(),
            seed: None,
        }
    }
}

/// Chaos wrapper for calls to named dependencies
#[derive(Debug)]
pub struct FailureSimulator {
    fault_injector: FaultInjector,
    latency_injector: LatencyInjector,
    dependency_breaker: DependencyBreaker,
}

impl FailureSimulator {
    #[must_use]
    pub fn new(config: &FailureSimulatorConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Simulator whose dependency breaks expire on `clock`
    #[must_use]
    pub fn with_clock(config: &FailureSimulatorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            fault_injector: FaultInjector::new(FaultInjectorConfig {
                enabled: true,
                fault_rate: config.failure_rate,
                seed: config.seed,
                ..Default::default()
            }),
            latency_injector: LatencyInjector::new(LatencyInjectorConfig {
                enabled: true,
                inject_rate: config.latency_rate,
                seed: config.seed,
                ..Default::default()
            }),
            dependency_breaker: DependencyBreaker::with_clock(
                DependencyBreakerConfig {
                    enabled: true,
                    break_rate: config.dependency_break_rate,
                    break_duration_ms: config.break_duration_ms,
                    seed: config.seed,
                },
                clock,
            ),
        }
    }

    /// Run `f` as a call to `dependency_id`, subject to injected chaos
    pub async fn wrap<F, Fut, T, E>(&self, dependency_id: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<InjectedError>,
    {
        self.dependency_breaker.maybe_break(dependency_id);
        if self.dependency_breaker.should_fail(dependency_id) {
            debug!(dependency = %dependency_id, "Simulated call to broken dependency");
            return Err(InjectedError::DependencyBroken(dependency_id.to_string()).into());
        }
        self.latency_injector.inject().await;
        self.fault_injector.apply(f).await
    }

    /// Break `dependency_id` for the configured duration
    pub fn break_dependency(&self, dependency_id: &str) {
        self.dependency_breaker.break_dependency(dependency_id);
    }

    /// Repair `dependency_id` immediately
    pub fn repair_dependency(&self, dependency_id: &str) {
        self.dependency_breaker.repair(dependency_id);
    }
}

impl MetricsSource for FailureSimulator {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let mut metrics = self.fault_injector.metrics();
        metrics.extend(self.latency_injector.metrics());
        metrics.extend(self.dependency_breaker.metrics());
        metrics
    }
}
