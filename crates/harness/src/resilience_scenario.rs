//! Resilience scenario - circuit breaker, bulkhead and retry around an operation

use std::{fmt::Display, future::Future, time::Instant};

use application::MetricsSource;
use chrono::Utc;
use domain::ResilienceMetric;
use resilience::{
    Bulkhead, BulkheadConfig, CircuitBreaker, CircuitBreakerConfig, RetryConfig, RetryEngine,
    run_guarded,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ScenarioReport;

/// Configuration for [`run_resilience_scenario`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceScenarioConfig {
    /// Operations to attempt
    #[serde(default = "default_op_count")]
    pub op_count: u32,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default = "default_bulkhead")]
    pub bulkhead: BulkheadConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

const fn default_op_count() -> u32 {
    50
}

fn default_bulkhead() -> BulkheadConfig {
    BulkheadConfig {
        max_concurrency: 5,
        max_queue: 10,
        ..Default::default()
    }
}

impl Default for ResilienceScenarioConfig {
    fn default() -> Self {
        Self {
            op_count: default_op_count(),
            circuit_breaker: CircuitBreakerConfig::default(),
            bulkhead: default_bulkhead(),
            retry: RetryConfig::default(),
        }
    }
}

/// Components driven by a resilience scenario, with the run report
#[derive(Debug)]
pub struct ResilienceRun {
    pub report: ScenarioReport,
    pub circuit_breaker: CircuitBreaker,
    pub bulkhead: Bulkhead,
    pub retry: RetryEngine,
}

/// Drive `op` through breaker, bulkhead and retry `op_count` times
///
/// Calls refused by the breaker or the bulkhead are skipped and counted as
/// `scenario.rejected`; they never reach `op`.
pub async fn run_resilience_scenario<F, Fut, E>(
    config: &ResilienceScenarioConfig,
    mut op: F,
) -> ResilienceRun
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let started_at = Utc::now();
    let start = Instant::now();

    let circuit_breaker =
        CircuitBreaker::with_config("scenario", config.circuit_breaker.clone());
    let bulkhead = Bulkhead::with_config("scenario", config.bulkhead.clone());
    let retry = RetryEngine::new(config.retry.clone());

    let mut completed = 0u64;
    let mut failed = 0u64;
    let mut rejected = 0u64;

    for _ in 0..config.op_count {
        match run_guarded(&circuit_breaker, &bulkhead, &retry, &mut op, |_| true).await {
            Ok(outcome) if outcome.is_ok() => completed += 1,
            Ok(_) => failed += 1,
            Err(_) => rejected += 1,
        }
    }

    info!(completed, failed, rejected, "Resilience scenario finished");

    let mut metrics = vec![
        ResilienceMetric::count("scenario.completed", completed),
        ResilienceMetric::count("scenario.failed", failed),
        ResilienceMetric::count("scenario.rejected", rejected),
    ];
    metrics.extend(circuit_breaker.metrics());
    metrics.extend(bulkhead.metrics());
    metrics.extend(retry.metrics());

    ResilienceRun {
        report: ScenarioReport::new("resilience", started_at, start.elapsed(), metrics),
        circuit_breaker,
        bulkhead,
        retry,
    }
}
