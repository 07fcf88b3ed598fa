//! Chaos scenario - latency and fault injection around an operation

use std::{future::Future, time::Instant};

use application::MetricsSource;
use chrono::Utc;
use domain::ResilienceMetric;
use resilience::chaos::{
    ChaosOrchestrator, ChaosOrchestratorConfig, DependencyBreaker, DependencyBreakerConfig,
    FaultInjector, FaultInjectorConfig, InjectedError, LatencyInjector, LatencyInjectorConfig,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ScenarioReport;

/// Configuration for [`run_chaos_scenario`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaosScenarioConfig {
    /// Operations to attempt
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    #[serde(default = "default_orchestrator")]
    pub orchestrator: ChaosOrchestratorConfig,

    #[serde(default = "default_fault_injector")]
    pub fault_injector: FaultInjectorConfig,

    #[serde(default = "default_latency_injector")]
    pub latency_injector: LatencyInjectorConfig,

    #[serde(default)]
    pub dependency_breaker: DependencyBreakerConfig,
}

const fn default_iterations() -> u32 {
    100
}

fn default_orchestrator() -> ChaosOrchestratorConfig {
    ChaosOrchestratorConfig {
        enabled: true,
        failure_rate: 0.1,
        ..Default::default()
    }
}

fn default_fault_injector() -> FaultInjectorConfig {
    FaultInjectorConfig {
        enabled: true,
        ..Default::default()
    }
}

fn default_latency_injector() -> LatencyInjectorConfig {
    LatencyInjectorConfig {
        enabled: true,
        ..Default::default()
    }
}

impl Default for ChaosScenarioConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            orchestrator: default_orchestrator(),
            fault_injector: default_fault_injector(),
            latency_injector: default_latency_injector(),
            dependency_breaker: DependencyBreakerConfig::default(),
        }
    }
}

impl ChaosScenarioConfig {
    /// Seed every injector with `seed`
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.orchestrator.seed = Some(seed);
        self.fault_injector.seed = Some(seed);
        self.latency_injector.seed = Some(seed);
        self.dependency_breaker.seed = Some(seed);
        self
    }
}

/// Components driven by a chaos scenario, with the run report
#[derive(Debug)]
pub struct ChaosRun {
    pub report: ScenarioReport,
    pub orchestrator: ChaosOrchestrator,
    pub fault_injector: FaultInjector,
    pub latency_injector: LatencyInjector,
    pub dependency_breaker: DependencyBreaker,
}

/// Outcome of one guarded attempt, keeping injected faults apart from
/// failures of the operation itself
enum Attempt<E> {
    Injected(InjectedError),
    Operation(E),
}

impl<E> From<InjectedError> for Attempt<E> {
    fn from(err: InjectedError) -> Self {
        Self::Injected(err)
    }
}

/// Run `op` `iterations` times under latency and fault injection
pub async fn run_chaos_scenario<F, Fut, E>(config: &ChaosScenarioConfig, mut op: F) -> ChaosRun
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let started_at = Utc::now();
    let start = Instant::now();

    let orchestrator = ChaosOrchestrator::new(config.orchestrator.clone());
    let fault_injector = FaultInjector::new(config.fault_injector.clone());
    let latency_injector = LatencyInjector::new(config.latency_injector.clone());
    let dependency_breaker = DependencyBreaker::new(config.dependency_breaker.clone());

    let mut completed = 0u64;
    let mut operation_failures = 0u64;

    for _ in 0..config.iterations {
        latency_injector.inject().await;
        let attempt = fault_injector
            .apply(|| {
                let fut = op();
                async move { fut.await.map_err(Attempt::Operation) }
            })
            .await;
        match attempt {
            Ok(()) => completed += 1,
            Err(Attempt::Injected(_)) => orchestrator.record_injected_failure(),
            Err(Attempt::Operation(_)) => operation_failures += 1,
        }
    }

    info!(completed, operation_failures, "Chaos scenario finished");

    let mut metrics = vec![
        ResilienceMetric::count("scenario.completed", completed),
        ResilienceMetric::count("scenario.operation_failures", operation_failures),
    ];
    metrics.extend(orchestrator.metrics());
    metrics.extend(fault_injector.metrics());
    metrics.extend(latency_injector.metrics());
    metrics.extend(dependency_breaker.metrics());

    ChaosRun {
        report: ScenarioReport::new("chaos", started_at, start.elapsed(), metrics),
        orchestrator,
        fault_injector,
        latency_injector,
        dependency_breaker,
    }
}
