//! Degradation controller driven by consecutive failure and success streaks
//!
//! Level 0 is full service. After `auto_downgrade_threshold` consecutive
//! failures the level steps up by one (capped at `levels - 1`); after
//! `auto_upgrade_threshold` consecutive successes it steps down by one. Both
//! streak counters reset on every level change.

use application::MetricsSource;
use domain::{MetricUnit, ResilienceMetric};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Configuration for a [`DegradationController`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradationControllerConfig {
    /// Number of levels, including full service
    #[serde(default = "default_levels")]
    pub levels: u32,

    /// Consecutive failures that trigger a downgrade
    #[serde(default = "default_auto_downgrade_threshold")]
    pub auto_downgrade_threshold: u32,

    /// Consecutive successes that trigger an upgrade
    #[serde(default = "default_auto_upgrade_threshold")]
    pub auto_upgrade_threshold: u32,
}

const fn default_levels() -> u32 {
    4
}

const fn default_auto_downgrade_threshold() -> u32 {
    5
}

const fn default_auto_upgrade_threshold() -> u32 {
    10
}

impl Default for DegradationControllerConfig {
    fn default() -> Self {
        Self {
            levels: default_levels(),
            auto_downgrade_threshold: default_auto_downgrade_threshold(),
            auto_upgrade_threshold: default_auto_upgrade_threshold(),
        }
    }
}

#[derive(Debug, Default)]
struct DegradationState {
    level: u32,
    failures: u32,
    successes: u32,
    downgrades: u64,
    upgrades: u64,
}

/// Stepwise degradation level tracker
#[derive(Debug)]
pub struct DegradationController {
    config: DegradationControllerConfig,
    state: Mutex<DegradationState>,
}

impl DegradationController {
    /// Creates a controller at level 0
    #[must_use]
    pub fn new(config: DegradationControllerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(DegradationState::default()),
        }
    }

    const fn max_level(&self) -> u32 {
        self.config.levels.saturating_sub(1)
    }

    /// Current level
    #[must_use]
    pub fn level(&self) -> u32 {
        self.state.lock().level
    }

    /// Whether the level is above full service
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.level() > 0
    }

    /// Records a failure; may step the level up
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.failures = state.failures.saturating_add(1);
        state.successes = 0;
        if state.failures >= self.config.auto_downgrade_threshold
            && state.level < self.max_level()
        {
            state.level += 1;
            state.failures = 0;
            state.downgrades += 1;
            info!(level = state.level, "Degradation level raised");
        }
    }

    /// Records a success; may step the level down
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.successes = state.successes.saturating_add(1);
        state.failures = 0;
        if state.successes >= self.config.auto_upgrade_threshold && state.level > 0 {
            state.level -= 1;
            state.successes = 0;
            state.upgrades += 1;
            info!(level = state.level, "Degradation level lowered");
        }
    }

    /// Sets the level directly, clamped to the configured range
    pub fn set_level(&self, level: u32) {
        let level = level.min(self.max_level());
        let mut state = self.state.lock();
        if state.level != level {
            info!(from = state.level, to = level, "Degradation level set");
        }
        state.level = level;
        state.failures = 0;
        state.successes = 0;
    }
}

impl Default for DegradationController {
    fn default() -> Self {
        Self::new(DegradationControllerConfig::default())
    }
}

impl MetricsSource for DegradationController {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::new(
                "degradation_controller.level",
                f64::from(state.level),
                MetricUnit::Level,
            ),
            ResilienceMetric::count("degradation_controller.downgrades", state.downgrades),
            ResilienceMetric::count("degradation_controller.upgrades", state.upgrades),
        ]
    }
}
