//! Restore engine: sliding-window restore budget

use std::{fmt, sync::Arc};

use application::{Clock, MetricsSource};
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{clock::system_clock, window::SlidingLog};

/// Configuration for a [`RestoreEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreEngineConfig {
    /// Restores allowed inside one window
    #[serde(default = "default_max_restores_per_window")]
    pub max_restores_per_window: usize,

    /// Sliding window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Time budget for one restore, in milliseconds
    #[serde(default = "default_restore_timeout_ms")]
    pub restore_timeout_ms: u64,
}

const fn default_max_restores_per_window() -> usize {
    10
}

const fn default_window_ms() -> u64 {
    3_600_000
}

const fn default_restore_timeout_ms() -> u64 {
    300_000
}

impl Default for RestoreEngineConfig {
    fn default() -> Self {
        Self {
            max_restores_per_window: default_max_restores_per_window(),
            window_ms: default_window_ms(),
            restore_timeout_ms: default_restore_timeout_ms(),
        }
    }
}

#[derive(Debug, Default)]
struct RestoreState {
    recent: SlidingLog,
    restores: u64,
    failures: u64,
    validations: u64,
}

/// Restore attempt budget
pub struct RestoreEngine {
    config: RestoreEngineConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<RestoreState>,
}

impl fmt::Debug for RestoreEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestoreEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RestoreEngine {
    #[must_use]
    pub fn new(config: RestoreEngineConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    #[must_use]
    pub fn with_clock(config: RestoreEngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(RestoreState::default()),
        }
    }

    /// Whether the window has room for another restore
    pub fn can_restore(&self) -> bool {
        let now = self.clock.now_ms();
        let recent = self.state.lock().recent.count(now, self.config.window_ms);
        let allowed = recent < self.config.max_restores_per_window;
        if !allowed {
            warn!(recent, "Restore budget exhausted");
        }
        allowed
    }

    /// Records a restore attempt; failed attempts use the budget too
    pub fn record_restore(&self, success: bool) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        state.recent.record(now, self.config.window_ms);
        if success {
            state.restores += 1;
        } else {
            state.failures += 1;
        }
    }

    pub fn record_validation(&self) {
        self.state.lock().validations += 1;
    }

    #[must_use]
    pub const fn restore_timeout_ms(&self) -> u64 {
        self.config.restore_timeout_ms
    }
}

impl Default for RestoreEngine {
    fn default() -> Self {
        Self::new(RestoreEngineConfig::default())
    }
}

impl MetricsSource for RestoreEngine {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("restore_engine.restores", state.restores),
            ResilienceMetric::count("restore_engine.failures", state.failures),
            ResilienceMetric::count("restore_engine.validations", state.validations),
        ]
    }
}
