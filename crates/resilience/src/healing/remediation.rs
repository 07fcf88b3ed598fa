//! Remediation engine: a windowed budget of mitigation actions

use std::{fmt, sync::Arc};

use application::{Clock, MetricsSource};
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{clock::system_clock, window::SlidingLog};

/// Mitigation taken by a remediation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemediationAction {
    None,
    Isolate,
    Restart,
    Fallback,
    Throttle,
    Alert,
}

/// Configuration for a [`RemediationEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationEngineConfig {
    /// Actions allowed inside one window
    #[serde(default = "default_max_actions_per_window")]
    pub max_actions_per_window: usize,

    /// Sliding window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

const fn default_max_actions_per_window() -> usize {
    20
}

const fn default_window_ms() -> u64 {
    60_000
}

impl Default for RemediationEngineConfig {
    fn default() -> Self {
        Self {
            max_actions_per_window: default_max_actions_per_window(),
            window_ms: default_window_ms(),
        }
    }
}

#[derive(Debug, Default)]
struct RemediationState {
    recent: SlidingLog,
    actions: u64,
    isolated: u64,
    restarts: u64,
    fallbacks: u64,
}

pub struct RemediationEngine {
    config: RemediationEngineConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<RemediationState>,
}

impl fmt::Debug for RemediationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemediationEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RemediationEngine {
    #[must_use]
    pub fn new(config: RemediationEngineConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    #[must_use]
    pub fn with_clock(config: RemediationEngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(RemediationState::default()),
        }
    }

    /// Whether the window has room for another action
    pub fn can_take_action(&self) -> bool {
        let now = self.clock.now_ms();
        self.state.lock().recent.count(now, self.config.window_ms)
            < self.config.max_actions_per_window
    }

    /// Records an action if the budget allows; returns whether it was recorded
    pub fn record_action(&self, action: RemediationAction) -> bool {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        if state.recent.count(now, self.config.window_ms) >= self.config.max_actions_per_window {
            warn!(?action, "Remediation budget exhausted");
            return false;
        }
        state.recent.record(now, self.config.window_ms);
        state.actions += 1;
        match action {
            RemediationAction::Isolate => state.isolated += 1,
            RemediationAction::Restart => state.restarts += 1,
            RemediationAction::Fallback => state.fallbacks += 1,
            RemediationAction::None | RemediationAction::Throttle | RemediationAction::Alert => {},
        }
        info!(?action, "Remediation action taken");
        true
    }
}

impl Default for RemediationEngine {
    fn default() -> Self {
        Self::new(RemediationEngineConfig::default())
    }
}

impl MetricsSource for RemediationEngine {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("remediation_engine.actions", state.actions),
            ResilienceMetric::count("remediation_engine.isolated", state.isolated),
            ResilienceMetric::count("remediation_engine.restarts", state.restarts),
            ResilienceMetric::count("remediation_engine.fallbacks", state.fallbacks),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn budget_limits_actions() {
        let clock = ManualClock::new(0);
        let e = RemediationEngine::with_clock(
            RemediationEngineConfig {
                max_actions_per_window: 2,
                window_ms: 1_000,
            },
            Arc::new(clock.clone()),
        );
        assert!(e.record_action(RemediationAction::Isolate));
        assert!(e.record_action(RemediationAction::Restart));
        assert!(!e.can_take_action());
        assert!(!e.record_action(RemediationAction::Fallback));
        clock.advance(1_001);
        assert!(e.record_action(RemediationAction::Fallback));
        let values: Vec<f64> = e.metrics().into_iter().map(|m| m.value).collect();
        assert_eq!(values, vec![3.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn action_parses_lowercase() {
        let a: RemediationAction = serde_json::from_str("\"throttle\"").unwrap();
        assert_eq!(a, RemediationAction::Throttle);
    }
}
