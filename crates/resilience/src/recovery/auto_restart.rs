//! Restart throttling over a sliding time window

use std::{fmt, sync::Arc};

use application::{Clock, MetricsSource};
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{clock::system_clock, window::SlidingLog};

/// Upper bound of [`AutoRestart::backoff_ms`]
pub const MAX_RESTART_BACKOFF_MS: u64 = 30_000;

/// Configuration for [`AutoRestart`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoRestartConfig {
    /// Restarts allowed inside one window
    #[serde(default = "default_max_restarts")]
    pub max_restarts: usize,

    /// Sliding window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Backoff before the first restart of a window
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

const fn default_max_restarts() -> usize {
    5
}

const fn default_window_ms() -> u64 {
    60_000
}

const fn default_backoff_base_ms() -> u64 {
    1_000
}

impl Default for AutoRestartConfig {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            window_ms: default_window_ms(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

#[derive(Debug, Default)]
struct RestartState {
    recent: SlidingLog,
    restarts: u64,
    throttled: u64,
}

/// Restart policy
pub struct AutoRestart {
    config: AutoRestartConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<RestartState>,
}

impl fmt::Debug for AutoRestart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoRestart")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AutoRestart {
    #[must_use]
    pub fn new(config: AutoRestartConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    #[must_use]
    pub fn with_clock(config: AutoRestartConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(RestartState::default()),
        }
    }

    /// Whether another restart is allowed in the current window
    pub fn should_restart(&self) -> bool {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        let recent = state.recent.count(now, self.config.window_ms);
        if recent >= self.config.max_restarts {
            state.throttled += 1;
            warn!(recent, max = self.config.max_restarts, "Restart throttled");
            return false;
        }
        true
    }

    /// Records a restart at the current time
    pub fn record_restart(&self) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        state.recent.record(now, self.config.window_ms);
        state.restarts += 1;
    }

    /// `backoff_base_ms * 2^n` capped at [`MAX_RESTART_BACKOFF_MS`], where `n`
    /// is the number of restarts in the current window
    pub fn backoff_ms(&self) -> u64 {
        let now = self.clock.now_ms();
        let recent = self.state.lock().recent.count(now, self.config.window_ms);
        let exponent = u32::try_from(recent).unwrap_or(u32::MAX);
        2_u64
            .checked_pow(exponent)
            .and_then(|factor| self.config.backoff_base_ms.checked_mul(factor))
            .map_or(MAX_RESTART_BACKOFF_MS, |ms| ms.min(MAX_RESTART_BACKOFF_MS))
    }

    /// Restarts inside the current window
    pub fn recent_count(&self) -> usize {
        let now = self.clock.now_ms();
        self.state.lock().recent.count(now, self.config.window_ms)
    }
}

impl Default for AutoRestart {
    fn default() -> Self {
        Self::new(AutoRestartConfig::default())
    }
}

impl MetricsSource for AutoRestart {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let recent = self.recent_count() as u64;
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("auto_restart.restarts", state.restarts),
            ResilienceMetric::count("auto_restart.throttled", state.throttled),
            ResilienceMetric::count("auto_restart.recent_count", recent),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn restart(max: usize, window_ms: u64, base_ms: u64) -> (AutoRestart, ManualClock) {
        let clock = ManualClock::new(0);
        let r = AutoRestart::with_clock(
            AutoRestartConfig {
                max_restarts: max,
                window_ms,
                backoff_base_ms: base_ms,
            },
            Arc::new(clock.clone()),
        );
        (r, clock)
    }

    #[test]
    fn throttles_at_max_restarts() {
        let (r, _) = restart(2, 1_000, 100);
        assert!(r.should_restart());
        r.record_restart();
        r.record_restart();
        assert!(!r.should_restart());
        let throttled = &r.metrics()[1];
        assert!((throttled.value - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn window_slides() {
        let (r, clock) = restart(2, 1_000, 100);
        r.record_restart();
        clock.advance(600);
        r.record_restart();
        assert!(!r.should_restart());
        clock.advance(401);
        assert!(r.should_restart());
        assert_eq!(r.recent_count(), 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let (r, _) = restart(100, 60_000, 1_000);
        assert_eq!(r.backoff_ms(), 1_000);
        r.record_restart();
        assert_eq!(r.backoff_ms(), 2_000);
        r.record_restart();
        assert_eq!(r.backoff_ms(), 4_000);
        for _ in 0..10 {
            r.record_restart();
        }
        assert_eq!(r.backoff_ms(), MAX_RESTART_BACKOFF_MS);
    }

    #[test]
    fn backoff_resets_as_window_empties() {
        let (r, clock) = restart(10, 1_000, 100);
        r.record_restart();
        r.record_restart();
        assert_eq!(r.backoff_ms(), 400);
        clock.advance(1_001);
        assert_eq!(r.backoff_ms(), 100);
    }

    #[test]
    fn huge_exponent_saturates() {
        let (r, _) = restart(usize::MAX, u64::MAX, u64::MAX);
        r.record_restart();
        assert_eq!(r.backoff_ms(), MAX_RESTART_BACKOFF_MS);
    }
}
