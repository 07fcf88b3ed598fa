//! End-to-end behaviour of the primitives in their canonical scenarios

use std::sync::Arc;

use domain::{CircuitState, FallbackTier};
use resilience::{
    Bulkhead, BulkheadConfig, CircuitBreaker, CircuitBreakerConfig, DegradationController,
    FallbackEngine, ManualClock,
    degradation::{DegradationControllerConfig, FallbackEngineConfig},
};

#[test]
fn circuit_breaker_trips_after_two_failures() {
    let cb = CircuitBreaker::with_config(
        "payments",
        CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        },
    );
    cb.record_failure();
    cb.record_failure();
    assert_eq!(cb.state(), CircuitState::Open);
    assert!(!cb.allow());
}

#[tokio::test]
async fn bulkhead_queues_then_wakes() {
    let bulkhead = Arc::new(Bulkhead::with_config(
        "search",
        BulkheadConfig {
            max_concurrency: 1,
            max_queue: 1,
            queue_timeout_ms: 5_000,
        },
    ));

    assert!(bulkhead.acquire().await.is_acquired());

    let waiter = {
        let b = Arc::clone(&bulkhead);
        tokio::spawn(async move { b.acquire().await })
    };
    while bulkhead.queue_len() == 0 {
        tokio::task::yield_now().await;
    }
    assert!(!waiter.is_finished());

    bulkhead.release();
    assert!(waiter.await.unwrap().is_acquired());
    assert_eq!(bulkhead.in_flight(), 1);
    assert_eq!(bulkhead.queue_len(), 0);
}

#[test]
fn degradation_steps_down_after_two_failures() {
    let controller = DegradationController::new(DegradationControllerConfig {
        auto_downgrade_threshold: 2,
        ..Default::default()
    });
    controller.record_failure();
    controller.record_failure();
    assert_eq!(controller.level(), 1);
}

#[test]
fn fallback_saturates_at_minimal() {
    let clock = ManualClock::new(0);
    let engine = FallbackEngine::with_clock(FallbackEngineConfig::default(), Arc::new(clock));
    assert_eq!(engine.tier(), FallbackTier::Primary);
    for _ in 0..4 {
        engine.downgrade();
    }
    assert_eq!(engine.tier(), FallbackTier::Minimal);
    engine.downgrade();
    assert_eq!(engine.tier(), FallbackTier::Minimal);
}
