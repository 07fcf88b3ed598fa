//! Consistency guard: sliding-window budget of consistency checks

use std::{fmt, sync::Arc};

use application::{Clock, MetricsSource};
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{clock::system_clock, window::SlidingLog};

/// Configuration for a [`ConsistencyGuard`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyGuardConfig {
    #[serde(default = "default_max_checks_per_window")]
    pub max_checks_per_window: usize,

    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

const fn default_max_checks_per_window() -> usize {
    1_000
}

const fn default_window_ms() -> u64 {
    60_000
}

impl Default for ConsistencyGuardConfig {
    fn default() -> Self {
        Self {
            max_checks_per_window: default_max_checks_per_window(),
            window_ms: default_window_ms(),
        }
    }
}

#[derive(Debug, Default)]
struct ConsistencyState {
    recent: SlidingLog,
    checks: u64,
    passed: u64,
    violations: u64,
}

pub struct ConsistencyGuard {
    config: ConsistencyGuardConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<ConsistencyState>,
}

impl fmt::Debug for ConsistencyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsistencyGuard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConsistencyGuard {
    #[must_use]
    pub fn new(config: ConsistencyGuardConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    #[must_use]
    pub fn with_clock(config: ConsistencyGuardConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(ConsistencyState::default()),
        }
    }

    /// Whether another check fits in the current window
    pub fn can_check(&self) -> bool {
        let now = self.clock.now_ms();
        self.state.lock().recent.count(now, self.config.window_ms)
            < self.config.max_checks_per_window
    }

    /// Records the outcome of a check
    pub fn record_check(&self, passed: bool) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        state.recent.record(now, self.config.window_ms);
        state.checks += 1;
        if passed {
            state.passed += 1;
        } else {
            state.violations += 1;
            warn!("Consistency violation");
        }
    }
}

impl Default for ConsistencyGuard {
    fn default() -> Self {
        Self::new(ConsistencyGuardConfig::default())
    }
}

impl MetricsSource for ConsistencyGuard {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("consistency_guard.checks", state.checks),
            ResilienceMetric::count("consistency_guard.violations", state.violations),
            ResilienceMetric::count("consistency_guard.passed", state.passed),
        ]
    }
}
