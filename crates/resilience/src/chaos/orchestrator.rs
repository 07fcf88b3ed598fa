//! Chaos orchestrator: one scenario-wide active fault

use application::MetricsSource;
use domain::{ChaosFaultType, ResilienceMetric};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::rng::SeededRng;

/// Configuration for a [`ChaosOrchestrator`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaosOrchestratorConfig {
    /// Master switch
    #[serde(default)]
    pub enabled: bool,

    /// Upper bound for injected latency in milliseconds
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,

    /// Background failure chance; zero turns failure injection off entirely
    #[serde(default)]
    pub failure_rate: f64,

    /// Seed for rolls; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

const fn default_max_latency_ms() -> u64 {
    500
}

impl Default for ChaosOrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_latency_ms: default_max_latency_ms(),
            failure_rate: 0.0,
            seed: None,
        }
    }
}

#[derive(Debug)]
struct OrchestratorState {
    active: ChaosFaultType,
    rng: SeededRng,
    injections: u64,
    latency_injected: u64,
    failures_injected: u64,
}

/// Scenario-level fault selector, independent of the per-call injectors
#[derive(Debug)]
pub struct ChaosOrchestrator {
    config: ChaosOrchestratorConfig,
    state: Mutex<OrchestratorState>,
}

impl ChaosOrchestrator {
    /// Creates an orchestrator with the given configuration
    #[must_use]
    pub fn new(config: ChaosOrchestratorConfig) -> Self {
        let rng = SeededRng::new(config.seed);
        Self {
            config,
            state: Mutex::new(OrchestratorState {
                active: ChaosFaultType::None,
                rng,
                injections: 0,
                latency_injected: 0,
                failures_injected: 0,
            }),
        }
    }

    /// Whether the orchestrator is switched on
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Selects the active fault
    pub fn set_fault(&self, fault: ChaosFaultType) {
        let mut state = self.state.lock();
        state.active = fault;
        if fault != ChaosFaultType::None {
            state.injections += 1;
            info!(fault = %fault, "Chaos fault activated");
        }
    }

    /// Currently active fault
    #[must_use]
    pub fn active_fault(&self) -> ChaosFaultType {
        self.state.lock().active
    }

    /// Whether the next call should fail
    ///
    /// A failure or dependency fault forces a hit; otherwise `failure_rate`
    /// is rolled.
    pub fn should_inject_failure(&self) -> bool {
        if !self.config.enabled || self.config.failure_rate <= 0.0 {
            return false;
        }
        let mut state = self.state.lock();
        if state.active.forces_failure() {
            return true;
        }
        state.rng.chance(self.config.failure_rate)
    }

    /// Latency to add to the next call; zero unless a latency fault is active
    pub fn latency_ms(&self) -> u64 {
        if !self.config.enabled {
            return 0;
        }
        let mut state = self.state.lock();
        if !state.active.adds_latency() {
            return 0;
        }
        state.latency_injected += 1;
        state.rng.range_inclusive(1, self.config.max_latency_ms.max(1))
    }

    /// Counts a failure injected on the orchestrator's behalf
    pub fn record_injected_failure(&self) {
        self.state.lock().failures_injected += 1;
    }
}

impl Default for ChaosOrchestrator {
    fn default() -> Self {
        Self::new(ChaosOrchestratorConfig::default())
    }
}

impl MetricsSource for ChaosOrchestrator {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("chaos_orchestrator.injections", state.injections),
            ResilienceMetric::count(
                "chaos_orchestrator.latency_injected",
                state.latency_injected,
            ),
            ResilienceMetric::count(
                "chaos_orchestrator.failures_injected",
                state.failures_injected,
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orchestrator(failure_rate: f64) -> ChaosOrchestrator {
        ChaosOrchestrator::new(ChaosOrchestratorConfig {
            enabled: true,
            max_latency_ms: 50,
            failure_rate,
            seed: Some(8),
        })
    }

    #[test]
    fn starts_with_no_fault() {
        let o = orchestrator(0.5);
        assert_eq!(o.active_fault(), ChaosFaultType::None);
        assert_eq!(o.latency_ms(), 0);
    }

    #[test]
    fn failure_fault_forces_failures() {
        let o = orchestrator(0.01);
        o.set_fault(ChaosFaultType::Dependency);
        for _ in 0..20 {
            assert!(o.should_inject_failure());
        }
    }

    #[test]
    fn zero_rate_disables_failures_even_with_fault() {
        let o = orchestrator(0.0);
        o.set_fault(ChaosFaultType::Failure);
        assert!(!o.should_inject_failure());
    }

    #[test]
    fn latency_fault_yields_bounded_latency() {
        let o = orchestrator(0.0);
        o.set_fault(ChaosFaultType::PacketLoss);
        for _ in 0..100 {
            let ms = o.latency_ms();
            assert!((1..=50).contains(&ms));
        }
    }

    #[test]
    fn disabled_orchestrator_is_inert() {
        let o = ChaosOrchestrator::default();
        o.set_fault(ChaosFaultType::Latency);
        assert_eq!(o.latency_ms(), 0);
        assert!(!o.should_inject_failure());
    }

    #[test]
    fn injections_count_non_none_faults() {
        let o = orchestrator(0.0);
        o.set_fault(ChaosFaultType::Cpu);
        o.set_fault(ChaosFaultType::None);
        o.set_fault(ChaosFaultType::Memory);
        o.record_injected_failure();
        let metrics = o.metrics();
        let injections = metrics
            .iter()
            .find(|m| m.name == "chaos_orchestrator.injections")
            .unwrap();
        assert!((injections.value - 2.0).abs() < f64::EPSILON);
    }
}
