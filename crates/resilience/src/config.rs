//! Aggregated configuration for every resilience primitive
//!
//! Each table defaults independently, so a file only needs the keys it
//! overrides. Sources are layered: built-in defaults, then an optional
//! `resilience.toml` (or an explicit path), then `RESILIENCE__*` environment
//! variables.

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    backoff::BackoffConfig,
    bulkhead::BulkheadConfig,
    chaos::{
        ChaosOrchestratorConfig, ChaosRunnerConfig, DependencyBreakerConfig, FaultInjectorConfig,
        LatencyInjectorConfig,
    },
    circuit_breaker::CircuitBreakerConfig,
    degradation::{DegradationControllerConfig, FallbackEngineConfig, QualityGovernorConfig},
    dr::{FailoverManagerConfig, RestoreEngineConfig, SnapshotEngineConfig},
    guards::{
        CpuGuardConfig, IoGuardConfig, MemoryGuardConfig, QuotaControllerConfig,
        ResourceGuardConfig,
    },
    healing::{AnomalyDetectorConfig, RemediationEngineConfig, SelfHealingLoopConfig},
    isolation::{BlastRadiusConfig, IsolationPoolConfig},
    recovery::{AutoRestartConfig, RecoveryManagerConfig, ReplayEngineConfig, StateRestorerConfig},
    reliability::{ConsistencyGuardConfig, IdempotencyGuardConfig},
    retry::RetryConfig,
    telemetry::TelemetryConfig,
};

/// File stem looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_NAME: &str = "resilience";

/// Prefix for environment overrides, e.g. `RESILIENCE__BULKHEAD__MAX_QUEUE`
pub const ENV_PREFIX: &str = "RESILIENCE";

pub(crate) const fn default_true() -> bool {
    true
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The merged configuration holds impossible values
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the whole resilience layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub circuit_breaker: CircuitBreakerConfig,
    pub bulkhead: BulkheadConfig,
    pub retry: RetryConfig,
    pub backoff: BackoffConfig,

    pub fault_injector: FaultInjectorConfig,
    pub latency_injector: LatencyInjectorConfig,
    pub dependency_breaker: DependencyBreakerConfig,
    pub chaos_orchestrator: ChaosOrchestratorConfig,
    pub chaos_runner: ChaosRunnerConfig,

    pub degradation: DegradationControllerConfig,
    pub fallback: FallbackEngineConfig,
    pub quality: QualityGovernorConfig,

    pub isolation_pool: IsolationPoolConfig,
    pub blast_radius: BlastRadiusConfig,

    pub recovery_manager: RecoveryManagerConfig,
    pub replay: ReplayEngineConfig,
    pub state_restorer: StateRestorerConfig,
    pub auto_restart: AutoRestartConfig,

    pub cpu_guard: CpuGuardConfig,
    pub io_guard: IoGuardConfig,
    pub memory_guard: MemoryGuardConfig,
    pub quota: QuotaControllerConfig,
    pub resource_guard: ResourceGuardConfig,

    pub failover: FailoverManagerConfig,
    pub snapshot: SnapshotEngineConfig,
    pub restore: RestoreEngineConfig,

    pub self_healing: SelfHealingLoopConfig,
    pub anomaly: AnomalyDetectorConfig,
    pub remediation: RemediationEngineConfig,

    pub idempotency: IdempotencyGuardConfig,
    pub consistency: ConsistencyGuardConfig,

    pub telemetry: TelemetryConfig,
}

impl ResilienceConfig {
    /// Load configuration from defaults, a file and the environment
    ///
    /// With `path`, that file must exist. Without it, `resilience.toml` (or
    /// any supported extension) in the working directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let loaded: Self = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject values no primitive can operate with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rates = [
            ("fault_injector.fault_rate", self.fault_injector.fault_rate),
            ("latency_injector.inject_rate", self.latency_injector.inject_rate),
            ("dependency_breaker.break_rate", self.dependency_breaker.break_rate),
            ("chaos_orchestrator.failure_rate", self.chaos_orchestrator.failure_rate),
        ];
        for (key, rate) in rates {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be within [0, 1], got {rate}"
                )));
            }
        }

        if self.latency_injector.min_ms > self.latency_injector.max_ms {
            return Err(ConfigError::Invalid(format!(
                "latency_injector.min_ms ({}) exceeds max_ms ({})",
                self.latency_injector.min_ms, self.latency_injector.max_ms
            )));
        }
        if self.quality.min_quality_level > self.quality.max_quality_level {
            return Err(ConfigError::Invalid(format!(
                "quality.min_quality_level ({}) exceeds max_quality_level ({})",
                self.quality.min_quality_level, self.quality.max_quality_level
            )));
        }
        if self.isolation_pool.compartments == 0 {
            return Err(ConfigError::Invalid(
                "isolation_pool.compartments must be at least 1".into(),
            ));
        }
        if self.bulkhead.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "bulkhead.max_concurrency must be at least 1".into(),
            ));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_threshold must be at least 1".into(),
            ));
        }
        if self.degradation.levels == 0 {
            return Err(ConfigError::Invalid(
                "degradation.levels must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
