//! Scenario harnesses for the resilience layer
//!
//! Each runner builds a fresh set of primitives, drives a caller-supplied
//! operation through them and returns the primitives together with a
//! [`ScenarioReport`] of their combined metrics.

mod chaos_scenario;
mod failure_simulator;
mod recovery_scenario;
mod report;
mod resilience_scenario;

pub use chaos_scenario::{ChaosRun, ChaosScenarioConfig, run_chaos_scenario};
pub use failure_simulator::{FailureSimulator, FailureSimulatorConfig};
pub use recovery_scenario::{
    RecoveryRun, RecoveryScenarioConfig, run_recovery_scenario, run_recovery_scenario_with_clock,
};
pub use report::ScenarioReport;
pub use resilience_scenario::{ResilienceRun, ResilienceScenarioConfig, run_resilience_scenario};
