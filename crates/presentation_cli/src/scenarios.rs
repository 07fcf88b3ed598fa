//! Scenario commands: build harness configuration from the loaded
//! configuration and command flags, run, and render the report

use std::{fmt::Write as _, sync::Arc};

use harness::{
    ChaosScenarioConfig, FailureSimulator, FailureSimulatorConfig, RecoveryScenarioConfig,
    ResilienceScenarioConfig, ScenarioReport, run_chaos_scenario, run_recovery_scenario,
    run_resilience_scenario,
};
use resilience::{ResilienceConfig, chaos::InjectedError};

use crate::cli::OutputFormat;

/// Dependency name used for synthetic calls
const SYNTHETIC_DEPENDENCY: &str = "synthetic";

/// Run the resilience scenario against a simulated dependency
pub async fn resilience(
    config: &ResilienceConfig,
    ops: u32,
    failure_rate: f64,
    latency_rate: f64,
    seed: Option<u64>,
) -> ScenarioReport {
    let scenario = ResilienceScenarioConfig {
        op_count: ops,
        circuit_breaker: config.circuit_breaker.clone(),
        bulkhead: config.bulkhead.clone(),
        retry: config.retry.clone(),
    };
    let simulator = Arc::new(FailureSimulator::new(&FailureSimulatorConfig {
        failure_rate,
        latency_rate,
        seed,
        ..Default::default()
    }));

    run_resilience_scenario(&scenario, || {
        let simulator = Arc::clone(&simulator);
        async move {
            simulator
                .wrap(SYNTHETIC_DEPENDENCY, || async { Ok::<(), InjectedError>(()) })
                .await
        }
    })
    .await
    .report
}

/// Run the chaos scenario against an always-successful operation
pub async fn chaos(
    config: &ResilienceConfig,
    iterations: u32,
    fault_rate: f64,
    no_latency: bool,
    seed: Option<u64>,
) -> ScenarioReport {
    let mut scenario = ChaosScenarioConfig {
        iterations,
        dependency_breaker: config.dependency_breaker.clone(),
        ..Default::default()
    };
    if let Some(seed) = seed {
        scenario = scenario.with_seed(seed);
    }
    scenario.orchestrator.failure_rate = fault_rate;
    scenario.fault_injector.fault_rate = fault_rate;
    scenario.fault_injector.fault_mode = config.fault_injector.fault_mode;
    scenario.fault_injector.timeout_ms = config.fault_injector.timeout_ms;
    scenario.latency_injector.min_ms = config.latency_injector.min_ms;
    scenario.latency_injector.max_ms = config.latency_injector.max_ms;
    scenario.latency_injector.enabled = !no_latency;

    run_chaos_scenario(&scenario, || async { Ok::<(), InjectedError>(()) })
        .await
        .report
}

/// Run the recovery scenario with the configured ring sizes
pub fn recovery(config: &ResilienceConfig, checkpoints: u32, events: u32) -> ScenarioReport {
    let scenario = RecoveryScenarioConfig {
        checkpoints,
        replay_events: events,
        recovery_manager: config.recovery_manager.clone(),
        replay: config.replay.clone(),
        state_restorer: config.state_restorer.clone(),
        auto_restart: config.auto_restart.clone(),
    };
    run_recovery_scenario(&scenario).report
}

/// Render a report in the requested format
pub fn render(report: &ScenarioReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(report.to_json_pretty()?),
        OutputFormat::Text => {
            let mut out = format!(
                "scenario {} ({}) finished in {}ms\n",
                report.scenario, report.run_id, report.duration_ms
            );
            for metric in &report.metrics {
                writeln!(out, "{:<40} {:>12} {}", metric.name, metric.value, metric.unit)?;
            }
            Ok(out)
        },
    }
}

/// Render the merged configuration; text output is TOML that `--config` accepts
pub fn render_config(config: &ResilienceConfig, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(config)?),
        OutputFormat::Text => Ok(toml::to_string_pretty(config)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resilience_without_failures_completes_every_op() {
        let report = resilience(&ResilienceConfig::default(), 10, 0.0, 0.0, Some(1)).await;
        assert_eq!(report.scenario, "resilience");
        assert_eq!(report.metric("scenario.completed"), Some(10.0));
    }

    #[tokio::test]
    async fn chaos_with_certain_faults_injects_every_call() {
        let report = chaos(&ResilienceConfig::default(), 25, 1.0, true, Some(9)).await;
        assert_eq!(report.metric("fault_injector.injected"), Some(25.0));
        assert_eq!(report.metric("latency_injector.injected"), Some(0.0));
    }

    #[test]
    fn recovery_uses_configured_ring_size() {
        let mut config = ResilienceConfig::default();
        config.recovery_manager.max_checkpoints = 2;
        let report = recovery(&config, 6, 4);
        assert_eq!(report.metric("recovery_manager.checkpoints"), Some(2.0));
    }

    #[test]
    fn text_render_lists_metrics() {
        let report = recovery(&ResilienceConfig::default(), 1, 1);
        let text = render(&report, OutputFormat::Text).unwrap();
        assert!(text.starts_with("scenario recovery"));
        assert!(text.contains("replay_engine.events"));
    }

    #[test]
    fn json_render_parses() {
        let report = recovery(&ResilienceConfig::default(), 1, 1);
        let json = render(&report, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["scenario"], "recovery");
    }

    #[test]
    fn text_config_loads_back() {
        use std::io::Write;

        let mut config = ResilienceConfig::default();
        config.circuit_breaker.failure_threshold = 9;
        let text = render_config(&config, OutputFormat::Text).unwrap();

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        let loaded = ResilienceConfig::load(Some(file.path())).unwrap();
        assert_eq!(loaded, config);
    }
}
