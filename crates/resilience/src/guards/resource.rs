//! Generic resource guard over a caller-maintained usage figure

use application::{AdmissionGuard, MetricsSource};
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::default_true;

/// Configuration for a [`ResourceGuard`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGuardConfig {
    /// Usage ceiling; zero disables the guard
    #[serde(default = "default_max_usage")]
    pub max_usage: u64,

    /// Usage at which a warning is counted
    #[serde(default = "default_warn_threshold")]
    pub warn_threshold: u64,

    /// Master switch
    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_max_usage() -> u64 {
    100
}

const fn default_warn_threshold() -> u64 {
    80
}

impl Default for ResourceGuardConfig {
    fn default() -> Self {
        Self {
            max_usage: default_max_usage(),
            warn_threshold: default_warn_threshold(),
            enabled: true,
        }
    }
}

#[derive(Debug, Default)]
struct ResourceState {
    usage: u64,
    throttled: u64,
    warnings: u64,
}

/// Admission guard over an arbitrary usage counter
#[derive(Debug)]
pub struct ResourceGuard {
    config: ResourceGuardConfig,
    state: Mutex<ResourceState>,
}

impl ResourceGuard {
    /// Creates a guard with the given configuration
    #[must_use]
    pub fn new(config: ResourceGuardConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ResourceState::default()),
        }
    }

    /// Current usage
    #[must_use]
    pub fn usage(&self) -> u64 {
        self.state.lock().usage
    }

    fn note_usage(&self, state: &mut ResourceState) {
        if state.usage >= self.config.warn_threshold {
            state.warnings += 1;
            warn!(
                usage = state.usage,
                threshold = self.config.warn_threshold,
                "Resource usage above warning threshold"
            );
        }
    }

    /// Overwrites the usage figure
    pub fn set_usage(&self, usage: u64) {
        let mut state = self.state.lock();
        state.usage = usage;
        self.note_usage(&mut state);
    }

    /// Adjusts usage by `delta`, flooring at zero; returns the new usage
    pub fn add_usage(&self, delta: i64) -> u64 {
        let mut state = self.state.lock();
        state.usage = state.usage.saturating_add_signed(delta);
        self.note_usage(&mut state);
        state.usage
    }

    /// Whether `required` more units fit, without reserving them
    pub fn would_allow(&self, required: u64) -> bool {
        if !self.config.enabled || self.config.max_usage == 0 {
            return true;
        }
        let mut state = self.state.lock();
        if state.usage.saturating_add(required) > self.config.max_usage {
            state.throttled += 1;
            return false;
        }
        true
    }
}

impl AdmissionGuard for ResourceGuard {
    fn allow(&self, cost: u64) -> bool {
        if !self.would_allow(cost) {
            return false;
        }
        self.add_usage(i64::try_from(cost).unwrap_or(i64::MAX));
        true
    }

    fn release(&self, cost: u64) {
        self.add_usage(-i64::try_from(cost).unwrap_or(i64::MAX));
    }

    fn name(&self) -> &'static str {
        "resource_guard"
    }
}

impl MetricsSource for ResourceGuard {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("resource_guard.usage", state.usage),
            ResilienceMetric::count("resource_guard.throttled", state.throttled),
            ResilienceMetric::count("resource_guard.warnings", state.warnings),
        ]
    }
}
