//! Blast-radius controller: a hard-capped set of isolated keys

use std::{collections::HashMap, fmt, sync::Arc};

use application::{Clock, MetricsSource};
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::system_clock;

/// Configuration for a [`BlastRadiusController`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlastRadiusConfig {
    /// Most keys isolated at once
    #[serde(default = "default_max_affected_keys")]
    pub max_affected_keys: usize,

    /// Share of a population, in percent, above which the radius is exceeded
    #[serde(default = "default_max_affected_percent")]
    pub max_affected_percent: f64,

    /// How long a key stays isolated, in milliseconds
    #[serde(default = "default_isolation_timeout_ms")]
    pub isolation_timeout_ms: u64,
}

const fn default_max_affected_keys() -> usize {
    100
}

const fn default_max_affected_percent() -> f64 {
    10.0
}

const fn default_isolation_timeout_ms() -> u64 {
    60_000
}

impl Default for BlastRadiusConfig {
    fn default() -> Self {
        Self {
            max_affected_keys: default_max_affected_keys(),
            max_affected_percent: default_max_affected_percent(),
            isolation_timeout_ms: default_isolation_timeout_ms(),
        }
    }
}

#[derive(Debug, Default)]
struct BlastState {
    isolated_until: HashMap<String, u64>,
    limited: u64,
    isolated: u64,
}

impl BlastState {
    fn purge_expired(&mut self, now_ms: u64) {
        self.isolated_until.retain(|_, until| now_ms < *until);
    }
}

/// Tracks affected keys up to a fixed cap
///
/// Once the cap is reached further keys are counted as `limited` and
/// otherwise ignored.
pub struct BlastRadiusController {
    config: BlastRadiusConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<BlastState>,
}

impl fmt::Debug for BlastRadiusController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlastRadiusController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BlastRadiusController {
    /// Creates a controller with the given configuration
    #[must_use]
    pub fn new(config: BlastRadiusConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Creates a controller reading time from `clock`
    #[must_use]
    pub fn with_clock(config: BlastRadiusConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(BlastState::default()),
        }
    }

    /// Isolates `key` for `isolation_timeout_ms`, unless the cap is reached
    pub fn record_affected(&self, key: &str) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        state.purge_expired(now);
        if state.isolated_until.len() >= self.config.max_affected_keys {
            state.limited += 1;
            warn!(key = %key, cap = self.config.max_affected_keys, "Blast radius cap reached");
            return;
        }
        state.isolated_until.insert(
            key.to_string(),
            now.saturating_add(self.config.isolation_timeout_ms),
        );
        state.isolated += 1;
    }

    /// Whether `key` is isolated; an expired isolation is dropped here
    pub fn is_isolated(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        match state.isolated_until.get(key).copied() {
            None => false,
            Some(until) if now >= until => {
                state.isolated_until.remove(key);
                false
            },
            Some(_) => true,
        }
    }

    /// Ends isolation for `key`
    pub fn clear_affected(&self, key: &str) {
        self.state.lock().isolated_until.remove(key);
    }

    /// Currently isolated keys
    pub fn affected_count(&self) -> usize {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        state.purge_expired(now);
        state.isolated_until.len()
    }

    /// Whether isolated keys exceed `max_affected_percent` of `total`
    #[allow(clippy::cast_precision_loss)]
    pub fn exceeds_percent(&self, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        let share = self.affected_count() as f64 * 100.0 / total as f64;
        share > self.config.max_affected_percent
    }
}

impl Default for BlastRadiusController {
    fn default() -> Self {
        Self::new(BlastRadiusConfig::default())
    }
}

impl MetricsSource for BlastRadiusController {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let affected = self.affected_count() as u64;
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("blast_radius.affected_count", affected),
            ResilienceMetric::count("blast_radius.limited", state.limited),
            ResilienceMetric::count("blast_radius.isolated", state.isolated),
        ]
    }
}
