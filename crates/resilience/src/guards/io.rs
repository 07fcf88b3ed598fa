//! I/O guard: operation rate per window plus concurrency

use std::{fmt, sync::Arc};

use application::{AdmissionGuard, Clock, MetricsSource};
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::Window;
use crate::{clock::system_clock, config::default_true};

/// Configuration for an [`IoGuard`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoGuardConfig {
    /// Operations admitted per window; zero disables the rate limit
    #[serde(default = "default_max_io_per_window")]
    pub max_io_per_window: u64,

    /// Concurrent operations; zero disables the concurrency limit
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,

    /// Rate window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Master switch
    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_max_io_per_window() -> u64 {
    1_000
}

const fn default_max_concurrent() -> u32 {
    50
}

const fn default_window_ms() -> u64 {
    1_000
}

impl Default for IoGuardConfig {
    fn default() -> Self {
        Self {
            max_io_per_window: default_max_io_per_window(),
            max_concurrent: default_max_concurrent(),
            window_ms: default_window_ms(),
            enabled: true,
        }
    }
}

#[derive(Debug, Default)]
struct IoState {
    in_flight: u32,
    window: Window,
    throttled: u64,
    allowed: u64,
}

/// Admission guard for I/O operations
pub struct IoGuard {
    config: IoGuardConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<IoState>,
}

impl fmt::Debug for IoGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoGuard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IoGuard {
    /// Creates a guard with the given configuration
    #[must_use]
    pub fn new(config: IoGuardConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Creates a guard reading time from `clock`
    #[must_use]
    pub fn with_clock(config: IoGuardConfig, clock: Arc<dyn Clock>) -> Self {
        let window = Window::starting_at(clock.now_ms());
        Self {
            config,
            clock,
            state: Mutex::new(IoState {
                window,
                ..IoState::default()
            }),
        }
    }

    /// Operations currently in flight
    #[must_use]
    pub fn in_flight(&self) -> u32 {
        self.state.lock().in_flight
    }
}

impl AdmissionGuard for IoGuard {
    /// Admits `cost` operations as one in-flight unit
    fn allow(&self, cost: u64) -> bool {
        if !self.config.enabled {
            return true;
        }
        let mut state = self.state.lock();
        state.window.roll(self.clock.now_ms(), self.config.window_ms);

        let over_rate = self.config.max_io_per_window > 0
            && state.window.used.saturating_add(cost) > self.config.max_io_per_window;
        let over_concurrency =
            self.config.max_concurrent > 0 && state.in_flight >= self.config.max_concurrent;

        if over_rate || over_concurrency {
            state.throttled += 1;
            return false;
        }
        state.window.used = state.window.used.saturating_add(cost);
        state.in_flight += 1;
        state.allowed += 1;
        true
    }

    fn release(&self, _cost: u64) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    fn name(&self) -> &'static str {
        "io_guard"
    }
}

impl MetricsSource for IoGuard {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("io_guard.in_flight", u64::from(state.in_flight)),
            ResilienceMetric::count("io_guard.throttled", state.throttled),
            ResilienceMetric::count("io_guard.allowed", state.allowed),
        ]
    }
}
