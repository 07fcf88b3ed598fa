//! Harness runners composed with the failure simulator

use std::sync::Arc;

use harness::{
    FailureSimulator, FailureSimulatorConfig, ResilienceScenarioConfig, run_resilience_scenario,
};
use resilience::{CircuitBreakerConfig, RetryConfig, chaos::InjectedError};

fn config(op_count: u32) -> ResilienceScenarioConfig {
    ResilienceScenarioConfig {
        op_count,
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 3,
            ..Default::default()
        },
        retry: RetryConfig {
            max_attempts: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn broken_dependency_trips_the_breaker() {
    let sim = Arc::new(FailureSimulator::new(&FailureSimulatorConfig {
        failure_rate: 0.0,
        latency_rate: 0.0,
        seed: Some(3),
        ..Default::default()
    }));
    sim.break_dependency("ledger");

    let run = run_resilience_scenario(&config(10), || {
        let sim = Arc::clone(&sim);
        async move { sim.wrap("ledger", || async { Ok::<(), InjectedError>(()) }).await }
    })
    .await;

    assert!(run.circuit_breaker.is_open());
    assert_eq!(run.report.metric("scenario.failed"), Some(3.0));
    assert_eq!(run.report.metric("scenario.rejected"), Some(7.0));
}

#[tokio::test]
async fn report_serializes_with_every_component() {
    let run = run_resilience_scenario(&config(3), || async { Ok::<(), String>(()) }).await;
    let json = run.report.to_json_pretty().unwrap();
    assert!(json.contains("\"scenario\": \"resilience\""));
    assert!(json.contains("circuit_breaker.state"));
    assert!(json.contains("bulkhead.in_flight"));
    assert!(json.contains("retry_engine.attempts"));
}
