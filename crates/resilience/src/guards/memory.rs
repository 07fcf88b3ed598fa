//! Memory guard: tracked byte budget with soft and hard limits

use application::{AdmissionGuard, MetricsSource};
use domain::{MetricUnit, ResilienceMetric};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::default_true;

/// Configuration for a [`MemoryGuard`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryGuardConfig {
    /// Tracked bytes at which pressure is reported; zero disables
    #[serde(default)]
    pub soft_limit_bytes: u64,

    /// Tracked bytes allocations may not exceed; zero disables
    #[serde(default)]
    pub hard_limit_bytes: u64,

    /// Master switch
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MemoryGuardConfig {
    fn default() -> Self {
        Self {
            soft_limit_bytes: 0,
            hard_limit_bytes: 0,
            enabled: true,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    tracked_bytes: u64,
    throttled: u64,
    soft_exceeded: u64,
}

/// Admission guard for memory allocations
#[derive(Debug)]
pub struct MemoryGuard {
    config: MemoryGuardConfig,
    state: Mutex<MemoryState>,
}

impl MemoryGuard {
    /// Creates a guard with the given configuration
    #[must_use]
    pub fn new(config: MemoryGuardConfig) -> Self {
        Self {
            config,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Bytes currently tracked
    #[must_use]
    pub fn tracked_bytes(&self) -> u64 {
        self.state.lock().tracked_bytes
    }

    /// Whether an allocation of `bytes` fits under the hard limit
    pub fn allow_alloc(&self, bytes: u64) -> bool {
        if !self.config.enabled || self.config.hard_limit_bytes == 0 {
            return true;
        }
        let mut state = self.state.lock();
        if state.tracked_bytes.saturating_add(bytes) > self.config.hard_limit_bytes {
            state.throttled += 1;
            return false;
        }
        true
    }

    /// Records an allocation
    pub fn track_alloc(&self, bytes: u64) {
        let mut state = self.state.lock();
        state.tracked_bytes = state.tracked_bytes.saturating_add(bytes);
        if self.config.soft_limit_bytes > 0 && state.tracked_bytes >= self.config.soft_limit_bytes
        {
            state.soft_exceeded += 1;
            warn!(
                tracked_bytes = state.tracked_bytes,
                soft_limit = self.config.soft_limit_bytes,
                "Memory soft limit exceeded"
            );
        }
    }

    /// Records a deallocation
    pub fn track_free(&self, bytes: u64) {
        let mut state = self.state.lock();
        state.tracked_bytes = state.tracked_bytes.saturating_sub(bytes);
    }

    /// Whether tracked bytes are at or over the soft limit
    #[must_use]
    pub fn is_over_soft(&self) -> bool {
        self.config.soft_limit_bytes > 0 && self.tracked_bytes() >= self.config.soft_limit_bytes
    }
}

impl AdmissionGuard for MemoryGuard {
    fn allow(&self, cost: u64) -> bool {
        if !self.allow_alloc(cost) {
            return false;
        }
        self.track_alloc(cost);
        true
    }

    fn release(&self, cost: u64) {
        self.track_free(cost);
    }

    fn name(&self) -> &'static str {
        "memory_guard"
    }
}

impl MetricsSource for MemoryGuard {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        #[allow(clippy::cast_precision_loss)]
        let tracked = state.tracked_bytes as f64;
        vec![
            ResilienceMetric::new("memory_guard.tracked_bytes", tracked, MetricUnit::Bytes),
            ResilienceMetric::count("memory_guard.throttled", state.throttled),
            ResilienceMetric::count("memory_guard.soft_exceeded", state.soft_exceeded),
        ]
    }
}
