//! Quality governor: a bounded quality level shed under load

use application::MetricsSource;
use domain::{MetricUnit, ResilienceMetric};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for a [`QualityGovernor`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGovernorConfig {
    /// Floor of the quality level
    #[serde(default)]
    pub min_quality_level: u32,

    /// Ceiling of the quality level and its starting value
    #[serde(default = "default_max_quality_level")]
    pub max_quality_level: u32,
}

const fn default_max_quality_level() -> u32 {
    100
}

impl Default for QualityGovernorConfig {
    fn default() -> Self {
        Self {
            min_quality_level: 0,
            max_quality_level: default_max_quality_level(),
        }
    }
}

#[derive(Debug)]
struct QualityState {
    level: u32,
    sheds: u64,
    restores: u64,
}

/// Bounded quality level
#[derive(Debug)]
pub struct QualityGovernor {
    config: QualityGovernorConfig,
    state: Mutex<QualityState>,
}

impl QualityGovernor {
    /// Creates a governor at full quality
    #[must_use]
    pub fn new(config: QualityGovernorConfig) -> Self {
        let level = config.max_quality_level;
        Self {
            config,
            state: Mutex::new(QualityState {
                level,
                sheds: 0,
                restores: 0,
            }),
        }
    }

    /// Current quality level
    #[must_use]
    pub fn level(&self) -> u32 {
        self.state.lock().level
    }

    /// Lowers quality by `amount`, not below the floor
    pub fn shed(&self, amount: u32) {
        let mut state = self.state.lock();
        state.level = state
            .level
            .saturating_sub(amount)
            .max(self.config.min_quality_level);
        state.sheds += 1;
        debug!(level = state.level, "Quality shed");
    }

    /// Raises quality by `amount`, not above the ceiling
    pub fn restore(&self, amount: u32) {
        let mut state = self.state.lock();
        state.level = state
            .level
            .saturating_add(amount)
            .min(self.config.max_quality_level);
        state.restores += 1;
        debug!(level = state.level, "Quality restored");
    }

    /// Sets the level, clamped to the configured bounds
    pub fn set_level(&self, level: u32) {
        self.state.lock().level = level
            .min(self.config.max_quality_level)
            .max(self.config.min_quality_level);
    }
}

impl Default for QualityGovernor {
    fn default() -> Self {
        Self::new(QualityGovernorConfig::default())
    }
}

impl MetricsSource for QualityGovernor {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::new(
                "quality_governor.level",
                f64::from(state.level),
                MetricUnit::Level,
            ),
            ResilienceMetric::count("quality_governor.sheds", state.sheds),
            ResilienceMetric::count("quality_governor.restores", state.restores),
        ]
    }
}
