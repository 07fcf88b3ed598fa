//! CPU guard: concurrent work limit plus an optional per-window work budget

use std::{fmt, sync::Arc};

use application::{AdmissionGuard, Clock, MetricsSource};
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Window;
use crate::{clock::system_clock, config::default_true};

/// Configuration for a [`CpuGuard`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuGuardConfig {
    /// Maximum concurrently admitted units of work; zero disables the limit
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,

    /// In-flight count at which [`CpuGuard::is_throttled`] reports pressure
    #[serde(default = "default_throttle_threshold")]
    pub throttle_threshold: u32,

    /// Work units admitted per window; zero disables the budget
    #[serde(default)]
    pub max_units_per_window: u64,

    /// Budget window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Master switch
    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_max_concurrent() -> u32 {
    100
}

const fn default_throttle_threshold() -> u32 {
    80
}

const fn default_window_ms() -> u64 {
    1_000
}

impl Default for CpuGuardConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            throttle_threshold: default_throttle_threshold(),
            max_units_per_window: 0,
            window_ms: default_window_ms(),
            enabled: true,
        }
    }
}

#[derive(Debug, Default)]
struct CpuState {
    in_flight: u32,
    window: Window,
    throttled: u64,
    allowed: u64,
}

/// Admission guard for CPU-bound work
pub struct CpuGuard {
    config: CpuGuardConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CpuState>,
}

impl fmt::Debug for CpuGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuGuard")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl CpuGuard {
    /// Creates a guard with the given configuration
    #[must_use]
    pub fn new(config: CpuGuardConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Creates a guard reading time from `clock`
    #[must_use]
    pub fn with_clock(config: CpuGuardConfig, clock: Arc<dyn Clock>) -> Self {
        let window = Window::starting_at(clock.now_ms());
        Self {
            config,
            clock,
            state: Mutex::new(CpuState {
                window,
                ..CpuState::default()
            }),
        }
    }

    /// Currently admitted units of work
    #[must_use]
    pub fn in_flight(&self) -> u32 {
        self.state.lock().in_flight
    }

    /// Whether in-flight work has reached the throttle threshold
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        self.config.enabled
            && self.config.max_concurrent > 0
            && self.in_flight() >= self.config.throttle_threshold
    }
}

impl AdmissionGuard for CpuGuard {
    fn allow(&self, cost: u64) -> bool {
        if !self.config.enabled {
            return true;
        }
        let mut state = self.state.lock();
        state.window.roll(self.clock.now_ms(), self.config.window_ms);

        let over_concurrency =
            self.config.max_concurrent > 0 && state.in_flight >= self.config.max_concurrent;
        let over_budget = self.config.max_units_per_window > 0
            && state.window.used.saturating_add(cost) > self.config.max_units_per_window;

        if over_concurrency || over_budget {
            state.throttled += 1;
            debug!(
                in_flight = state.in_flight,
                window_used = state.window.used,
                "CPU guard throttling"
            );
            return false;
        }
        state.in_flight += 1;
        state.window.used = state.window.used.saturating_add(cost);
        state.allowed += 1;
        true
    }

    fn release(&self, _cost: u64) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    fn name(&self) -> &'static str {
        "cpu_guard"
    }
}

impl MetricsSource for CpuGuard {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("cpu_guard.in_flight", u64::from(state.in_flight)),
            ResilienceMetric::count("cpu_guard.throttled", state.throttled),
            ResilienceMetric::count("cpu_guard.allowed", state.allowed),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn limits_concurrency() {
        let guard = CpuGuard::new(CpuGuardConfig {
            max_concurrent: 2,
            ..Default::default()
        });
        assert!(guard.allow(1));
        assert!(guard.allow(1));
        assert!(!guard.allow(1));
        guard.release(1);
        assert!(guard.allow(1));
    }

    #[test]
    fn disabled_guard_fails_open() {
        let guard = CpuGuard::new(CpuGuardConfig {
            max_concurrent: 1,
            enabled: false,
            ..Default::default()
        });
        for _ in 0..10 {
            assert!(guard.allow(1));
        }
    }

    #[test]
    fn zero_limit_fails_open() {
        let guard = CpuGuard::new(CpuGuardConfig {
            max_concurrent: 0,
            ..Default::default()
        });
        for _ in 0..10 {
            assert!(guard.allow(1));
        }
        assert!(!guard.is_throttled());
    }

    #[test]
    fn window_budget_resets() {
        let clock = ManualClock::new(0);
        let guard = CpuGuard::with_clock(
            CpuGuardConfig {
                max_units_per_window: 10,
                window_ms: 1_000,
                ..Default::default()
            },
            Arc::new(clock.clone()),
        );
        assert!(guard.allow(6));
        guard.release(6);
        assert!(!guard.allow(5));
        clock.advance(1_000);
        assert!(guard.allow(5));
    }

    #[test]
    fn throttle_threshold() {
        let guard = CpuGuard::new(CpuGuardConfig {
            max_concurrent: 10,
            throttle_threshold: 2,
            ..Default::default()
        });
        guard.allow(1);
        assert!(!guard.is_throttled());
        guard.allow(1);
        assert!(guard.is_throttled());
    }

    #[test]
    fn metrics_count_throttles() {
        let guard = CpuGuard::new(CpuGuardConfig {
            max_concurrent: 1,
            ..Default::default()
        });
        guard.allow(1);
        guard.allow(1);
        let throttled = guard
            .metrics()
            .into_iter()
            .find(|m| m.name == "cpu_guard.throttled")
            .unwrap();
        assert!((throttled.value - 1.0).abs() < f64::EPSILON);
    }
}
