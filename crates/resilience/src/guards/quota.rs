//! Quota controller: fixed-window usage budget

use std::{fmt, sync::Arc};

use application::{AdmissionGuard, Clock, MetricsSource};
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Window;
use crate::{clock::system_clock, config::default_true};

/// Configuration for a [`QuotaController`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaControllerConfig {
    /// Units allowed per window; zero disables the quota
    #[serde(default = "default_quota")]
    pub quota: u64,

    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Master switch
    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_quota() -> u64 {
    1_000
}

const fn default_window_ms() -> u64 {
    60_000
}

impl Default for QuotaControllerConfig {
    fn default() -> Self {
        Self {
            quota: default_quota(),
            window_ms: default_window_ms(),
            enabled: true,
        }
    }
}

#[derive(Debug, Default)]
struct QuotaState {
    window: Window,
    exceeded: u64,
    allowed: u64,
}

/// Fixed-window quota enforcement
pub struct QuotaController {
    config: QuotaControllerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<QuotaState>,
}

impl fmt::Debug for QuotaController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuotaController")
            .field("config", &self.config)
            .field("used", &self.used())
            .finish_non_exhaustive()
    }
}

impl QuotaController {
    /// Creates a controller with the given configuration
    #[must_use]
    pub fn new(config: QuotaControllerConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Creates a controller reading time from `clock`
    #[must_use]
    pub fn with_clock(config: QuotaControllerConfig, clock: Arc<dyn Clock>) -> Self {
        let window = Window::starting_at(clock.now_ms());
        Self {
            config,
            clock,
            state: Mutex::new(QuotaState {
                window,
                ..QuotaState::default()
            }),
        }
    }

    /// Units used in the current window
    #[must_use]
    pub fn used(&self) -> u64 {
        self.state
            .lock()
            .window
            .used_at(self.clock.now_ms(), self.config.window_ms)
    }

    /// Units left in the current window
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.config.quota.saturating_sub(self.used())
    }
}

impl AdmissionGuard for QuotaController {
    fn allow(&self, cost: u64) -> bool {
        if !self.config.enabled || self.config.quota == 0 {
            return true;
        }
        let mut state = self.state.lock();
        state.window.roll(self.clock.now_ms(), self.config.window_ms);
        if state.window.used.saturating_add(cost) > self.config.quota {
            state.exceeded += 1;
            debug!(
                used = state.window.used,
                quota = self.config.quota,
                "Quota exceeded"
            );
            return false;
        }
        state.window.used += cost;
        state.allowed += 1;
        true
    }

    /// Consumed quota is not returned before the window rolls
    fn release(&self, _cost: u64) {}

    fn name(&self) -> &'static str {
        "quota_controller"
    }
}

impl MetricsSource for QuotaController {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let used = self.used();
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("quota_controller.used", used),
            ResilienceMetric::count("quota_controller.exceeded", state.exceeded),
            ResilienceMetric::count("quota_controller.allowed", state.allowed),
        ]
    }
}
