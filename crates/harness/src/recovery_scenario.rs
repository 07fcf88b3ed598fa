//! Recovery scenario - checkpoints, snapshots and replay from the latest checkpoint

use std::{sync::Arc, time::Instant};

use application::{Clock, MetricsSource};
use chrono::Utc;
use resilience::{
    recovery::{
        AutoRestart, AutoRestartConfig, RecoveryManager, RecoveryManagerConfig, ReplayEngine,
        ReplayEngineConfig, StateRestorer, StateRestorerConfig,
    },
    system_clock,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::ScenarioReport;

/// Configuration for [`run_recovery_scenario`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryScenarioConfig {
    /// Checkpoints (and matching snapshots) to create
    #[serde(default = "default_checkpoints")]
    pub checkpoints: u32,

    /// Events to record after the checkpoints
    #[serde(default = "default_replay_events")]
    pub replay_events: u32,

    #[serde(default)]
    pub recovery_manager: RecoveryManagerConfig,

    #[serde(default)]
    pub replay: ReplayEngineConfig,

    #[serde(default)]
    pub state_restorer: StateRestorerConfig,

    #[serde(default)]
    pub auto_restart: AutoRestartConfig,
}

const fn default_checkpoints() -> u32 {
    5
}

const fn default_replay_events() -> u32 {
    20
}

impl Default for RecoveryScenarioConfig {
    fn default() -> Self {
        Self {
            checkpoints: default_checkpoints(),
            replay_events: default_replay_events(),
            recovery_manager: RecoveryManagerConfig::default(),
            replay: ReplayEngineConfig::default(),
            state_restorer: StateRestorerConfig::default(),
            auto_restart: AutoRestartConfig::default(),
        }
    }
}

/// Components driven by a recovery scenario, with the run report
#[derive(Debug)]
pub struct RecoveryRun {
    pub report: ScenarioReport,
    pub recovery_manager: RecoveryManager,
    pub replay_engine: ReplayEngine,
    pub state_restorer: StateRestorer,
    pub auto_restart: AutoRestart,
}

/// Create checkpoints and snapshots, record events, then replay every event
/// from the latest checkpoint and restore the latest snapshot
pub fn run_recovery_scenario(config: &RecoveryScenarioConfig) -> RecoveryRun {
    run_recovery_scenario_with_clock(config, system_clock())
}

/// [`run_recovery_scenario`] with every component reading `clock`
pub fn run_recovery_scenario_with_clock(
    config: &RecoveryScenarioConfig,
    clock: Arc<dyn Clock>,
) -> RecoveryRun {
    let started_at = Utc::now();
    let start = Instant::now();

    let recovery_manager =
        RecoveryManager::with_clock(config.recovery_manager.clone(), Arc::clone(&clock));
    let replay_engine = ReplayEngine::with_clock(config.replay.clone(), Arc::clone(&clock));
    let state_restorer =
        StateRestorer::with_clock(config.state_restorer.clone(), Arc::clone(&clock));
    let auto_restart = AutoRestart::with_clock(config.auto_restart.clone(), clock);

    for i in 0..config.checkpoints {
        recovery_manager.create_checkpoint(format!("cp-{i}"), json!({ "seq": i }));
        state_restorer.save_snapshot(format!("snap-{i}"), json!({ "state": i }), u64::from(i));
    }

    for i in 0..config.replay_events {
        replay_engine.record_event(format!("evt-{i}"), json!({ "i": i }));
    }

    let mut replayed = 0;
    if let Some(latest) = recovery_manager.latest_checkpoint() {
        replayed = replay_engine.events_from_checkpoint(&latest).len();
        replay_engine.record_replay(replayed);
        if state_restorer.latest_snapshot().is_some() {
            state_restorer.record_restore();
        }
        recovery_manager.record_recovery();
    }

    info!(
        checkpoints = config.checkpoints,
        replayed, "Recovery scenario finished"
    );

    let mut metrics = recovery_manager.metrics();
    metrics.extend(replay_engine.metrics());
    metrics.extend(state_restorer.metrics());
    metrics.extend(auto_restart.metrics());

    RecoveryRun {
        report: ScenarioReport::new("recovery", started_at, start.elapsed(), metrics),
        recovery_manager,
        replay_engine,
        state_restorer,
        auto_restart,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_run_replays_every_event_after_latest_checkpoint() {
        let run = run_recovery_scenario(&RecoveryScenarioConfig::default());
        assert_eq!(run.report.scenario, "recovery");
        assert_eq!(run.report.metric("recovery_manager.checkpoints"), Some(5.0));
        assert_eq!(run.report.metric("replay_engine.events"), Some(20.0));
        assert_eq!(run.report.metric("replay_engine.replays"), Some(1.0));
        assert_eq!(run.report.metric("replay_engine.steps_replayed"), Some(20.0));
        assert_eq!(run.report.metric("state_restore.restores"), Some(1.0));
        assert_eq!(run.report.metric("recovery_manager.recoveries"), Some(1.0));
    }

    #[test]
    fn shared_clock_orders_events_after_checkpoints() {
        let clock = resilience::ManualClock::new(1_000);
        let run = run_recovery_scenario_with_clock(
            &RecoveryScenarioConfig {
                checkpoints: 2,
                replay_events: 4,
                ..Default::default()
            },
            Arc::new(clock),
        );
        assert_eq!(run.report.metric("replay_engine.steps_replayed"), Some(4.0));
        let latest = run.recovery_manager.latest_checkpoint().unwrap();
        assert_eq!(latest.timestamp_ms, 1_000);
    }

    #[test]
    fn no_checkpoints_means_no_replay() {
        let run = run_recovery_scenario(&RecoveryScenarioConfig {
            checkpoints: 0,
            ..Default::default()
        });
        assert_eq!(run.report.metric("replay_engine.replays"), Some(0.0));
        assert_eq!(run.report.metric("state_restore.restores"), Some(0.0));
        assert!(run.recovery_manager.latest_checkpoint().is_none());
    }

    #[test]
    fn ring_capacity_bounds_checkpoints() {
        let run = run_recovery_scenario(&RecoveryScenarioConfig {
            checkpoints: 10,
            recovery_manager: RecoveryManagerConfig {
                max_checkpoints: 3,
                ..Default::default()
            },
            ..Default::default()
        });
        assert_eq!(run.report.metric("recovery_manager.checkpoints"), Some(3.0));
        let latest = run.recovery_manager.latest_checkpoint().unwrap();
        assert_eq!(latest.id, "cp-9");
    }
}
