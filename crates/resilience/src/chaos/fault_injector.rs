//! Fault injector: probabilistic failure, timeout or slowdown of an operation

use std::{future::Future, time::Duration};

use application::MetricsSource;
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::InjectedError;
use crate::rng::SeededRng;

/// What happens to an operation when a fault is injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultMode {
    /// Fail without running the operation
    #[default]
    Throw,
    /// Same as `Throw`
    ReturnError,
    /// Race the operation against `timeout_ms`; the timer wins with a timeout error
    Timeout,
    /// Sleep `timeout_ms`, then run the operation
    Slow,
}

/// Configuration for a [`FaultInjector`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultInjectorConfig {
    /// Master switch
    #[serde(default)]
    pub enabled: bool,

    /// Chance of injecting a fault on each call
    #[serde(default = "default_fault_rate")]
    pub fault_rate: f64,

    /// Fault behaviour
    #[serde(default)]
    pub fault_mode: FaultMode,

    /// Deadline for `timeout` mode, delay for `slow` mode
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Seed for the injection rolls; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

const fn default_fault_rate() -> f64 {
    0.1
}

const fn default_timeout_ms() -> u64 {
    1_000
}

impl Default for FaultInjectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fault_rate: default_fault_rate(),
            fault_mode: FaultMode::default(),
            timeout_ms: default_timeout_ms(),
            seed: None,
        }
    }
}

#[derive(Debug)]
struct FaultState {
    rng: SeededRng,
    injected: u64,
    skipped: u64,
}

/// Probabilistic fault injector
#[derive(Debug)]
pub struct FaultInjector {
    config: FaultInjectorConfig,
    state: Mutex<FaultState>,
}

impl FaultInjector {
    /// Creates an injector with the given configuration
    #[must_use]
    pub fn new(config: FaultInjectorConfig) -> Self {
        let rng = SeededRng::new(config.seed);
        Self {
            config,
            state: Mutex::new(FaultState {
                rng,
                injected: 0,
                skipped: 0,
            }),
        }
    }

    /// Whether injection is switched on
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Rolls for a fault; counts the outcome
    pub fn should_inject(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let mut state = self.state.lock();
        let inject = state.rng.chance(self.config.fault_rate);
        if inject {
            state.injected += 1;
        } else {
            state.skipped += 1;
        }
        inject
    }

    /// Runs `f`, possibly failing, timing out or delaying it
    pub async fn apply<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<InjectedError>,
    {
        if !self.should_inject() {
            return f().await;
        }
        let timeout = Duration::from_millis(self.config.timeout_ms);
        match self.config.fault_mode {
            FaultMode::Throw | FaultMode::ReturnError => {
                debug!("Injecting failure");
                Err(InjectedError::Failure("fault injector".to_string()).into())
            },
            FaultMode::Timeout => match tokio::time::timeout(timeout, f()).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(timeout_ms = self.config.timeout_ms, "Injected timeout fired");
                    Err(InjectedError::Timeout(self.config.timeout_ms).into())
                },
            },
            FaultMode::Slow => {
                tokio::time::sleep(timeout).await;
                f().await
            },
        }
    }
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self::new(FaultInjectorConfig::default())
    }
}

impl MetricsSource for FaultInjector {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("fault_injector.injected", state.injected),
            ResilienceMetric::count("fault_injector.skipped", state.skipped),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn injector(rate: f64, mode: FaultMode, timeout_ms: u64) -> FaultInjector {
        FaultInjector::new(FaultInjectorConfig {
            enabled: true,
            fault_rate: rate,
            fault_mode: mode,
            timeout_ms,
            seed: Some(1),
        })
    }

    #[test]
    fn config_default() {
        let config = FaultInjectorConfig::default();
        assert!(!config.enabled);
        assert!((config.fault_rate - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.fault_mode, FaultMode::Throw);
        assert_eq!(config.timeout_ms, 1_000);
    }

    #[test]
    fn fault_mode_parses_snake_case() {
        let mode: FaultMode = serde_json::from_str("\"return_error\"").unwrap();
        assert_eq!(mode, FaultMode::ReturnError);
    }

    #[tokio::test]
    async fn disabled_injector_passes_through() {
        let inj = FaultInjector::default();
        let result: Result<u32, InjectedError> = inj.apply(|| async { Ok(5) }).await;
        assert_eq!(result.unwrap(), 5);
        assert!(!inj.should_inject());
    }

    #[tokio::test]
    async fn throw_mode_skips_operation() {
        let inj = injector(1.0, FaultMode::Throw, 10);
        let ran = AtomicBool::new(false);
        let result: Result<(), InjectedError> = inj
            .apply(|| async {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(InjectedError::Failure(_))));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_mode_times_out_slow_operation() {
        let inj = injector(1.0, FaultMode::Timeout, 50);
        let result: Result<(), InjectedError> = inj
            .apply(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(())
            })
            .await;
        assert_eq!(result, Err(InjectedError::Timeout(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_mode_lets_fast_operation_finish() {
        let inj = injector(1.0, FaultMode::Timeout, 50);
        let result: Result<u8, InjectedError> = inj.apply(|| async { Ok(1) }).await;
        assert_eq!(result, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_mode_delays_then_runs() {
        let inj = injector(1.0, FaultMode::Slow, 100);
        let start = tokio::time::Instant::now();
        let result: Result<u8, InjectedError> = inj.apply(|| async { Ok(2) }).await;
        assert_eq!(result, Ok(2));
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn counts_injected_and_skipped() {
        let inj = injector(0.5, FaultMode::Throw, 10);
        for _ in 0..100 {
            inj.should_inject();
        }
        let metrics = inj.metrics();
        let total: f64 = metrics.iter().map(|m| m.value).sum();
        assert!((total - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn same_seed_same_decisions() {
        let a = injector(0.3, FaultMode::Throw, 10);
        let b = injector(0.3, FaultMode::Throw, 10);
        let da: Vec<bool> = (0..200).map(|_| a.should_inject()).collect();
        let db: Vec<bool> = (0..200).map(|_| b.should_inject()).collect();
        assert_eq!(da, db);
    }
}
