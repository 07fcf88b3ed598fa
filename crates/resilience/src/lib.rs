//! Resilience layer - fault tolerance and chaos primitives
//!
//! Implements the adapters for the application ports (clocks, guards,
//! metric sources) and every composable primitive: circuit breaker,
//! bulkhead, retry and backoff, chaos injection, degradation control,
//! isolation, recovery, resource guards, disaster recovery, self-healing
//! and request reliability.
//!
//! Primitives are plain structs with `&self` methods, safe to share behind
//! an `Arc`. Each one reports its counters through
//! [`application::MetricsSource`].

pub mod backoff;
pub mod bulkhead;
pub mod chaos;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod degradation;
pub mod dr;
pub mod guarded_engine;
pub mod guards;
pub mod healing;
pub mod isolation;
pub mod metrics_sink;
pub mod recovery;
pub mod reliability;
pub mod retry;
pub mod rng;
pub mod telemetry;
mod window;

pub use backoff::{BackoffConfig, BackoffEngine, BackoffStrategy};
pub use bulkhead::{AcquireOutcome, Bulkhead, BulkheadConfig, BulkheadError};
pub use chaos::{
    ChaosOrchestrator, ChaosRunner, DependencyBreaker, FaultInjector, FaultMode, InjectedError,
    LatencyInjector,
};
pub use circuit_breaker::{
    Admission, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitOpenError,
};
pub use clock::{ManualClock, SystemClock, system_clock};
pub use config::{ConfigError, ResilienceConfig};
pub use degradation::{DegradationController, FallbackEngine, QualityGovernor};
pub use dr::{FailoverManager, RestoreEngine, SnapshotEngine};
pub use guarded_engine::{GuardRejection, GuardedEngine, run_guarded};
pub use guards::{CpuGuard, IoGuard, MemoryGuard, QuotaController, ResourceGuard};
pub use healing::{AnomalyDetector, RemediationEngine, SelfHealingLoop, ShutdownHooks};
pub use isolation::{BlastRadiusController, IsolationPool};
pub use recovery::{AutoRestart, RecoveryManager, ReplayEngine, StateRestorer};
pub use reliability::{ConsistencyGuard, IdempotencyGuard};
pub use retry::{RetryConfig, RetryEngine, RetryResult};
pub use rng::SeededRng;
pub use telemetry::{TelemetryConfig, TelemetryError, init_tracing};
