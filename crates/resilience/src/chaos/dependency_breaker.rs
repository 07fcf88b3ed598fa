//! Dependency breaker: marks named dependencies unavailable for a while

use std::{collections::HashMap, fmt, sync::Arc};

use application::{Clock, MetricsSource};
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{clock::system_clock, rng::SeededRng};

/// Configuration for a [`DependencyBreaker`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyBreakerConfig {
    /// Master switch; a disabled breaker never breaks anything
    #[serde(default)]
    pub enabled: bool,

    /// Chance that [`DependencyBreaker::maybe_break`] breaks a dependency
    #[serde(default)]
    pub break_rate: f64,

    /// How long a break lasts, in milliseconds
    #[serde(default = "default_break_duration_ms")]
    pub break_duration_ms: u64,

    /// Seed for break rolls; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

const fn default_break_duration_ms() -> u64 {
    10_000
}

impl Default for DependencyBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            break_rate: 0.0,
            break_duration_ms: default_break_duration_ms(),
            seed: None,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    broken_until: HashMap<String, u64>,
    rng: SeededRng,
    breaks: u64,
    recoveries: u64,
}

/// Simulated dependency outages
pub struct DependencyBreaker {
    config: DependencyBreakerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<BreakerState>,
}

impl fmt::Debug for DependencyBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyBreaker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DependencyBreaker {
    /// Creates a breaker with the given configuration
    #[must_use]
    pub fn new(config: DependencyBreakerConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Creates a breaker reading time from `clock`
    #[must_use]
    pub fn with_clock(config: DependencyBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let rng = SeededRng::new(config.seed);
        Self {
            config,
            clock,
            state: Mutex::new(BreakerState {
                broken_until: HashMap::new(),
                rng,
                breaks: 0,
                recoveries: 0,
            }),
        }
    }

    /// Whether the breaker is switched on
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Marks `dependency_id` broken for `break_duration_ms`
    pub fn break_dependency(&self, dependency_id: &str) {
        if !self.config.enabled {
            return;
        }
        let until = self
            .clock
            .now_ms()
            .saturating_add(self.config.break_duration_ms);
        let mut state = self.state.lock();
        state.broken_until.insert(dependency_id.to_string(), until);
        state.breaks += 1;
        info!(dependency = %dependency_id, until_ms = until, "Dependency broken");
    }

    /// Rolls `break_rate` and breaks the dependency on a hit
    pub fn maybe_break(&self, dependency_id: &str) -> bool {
        if !self.config.enabled {
            return false;
        }
        let hit = self.state.lock().rng.chance(self.config.break_rate);
        if hit {
            self.break_dependency(dependency_id);
        }
        hit
    }

    /// Whether the dependency is broken; expired breaks are cleared here
    pub fn is_broken(&self, dependency_id: &str) -> bool {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        match state.broken_until.get(dependency_id).copied() {
            None => false,
            Some(until) if now >= until => {
                state.broken_until.remove(dependency_id);
                state.recoveries += 1;
                false
            },
            Some(_) => true,
        }
    }

    /// Clears a break immediately
    pub fn repair(&self, dependency_id: &str) {
        self.state.lock().broken_until.remove(dependency_id);
    }

    /// Whether a call to the dependency should fail
    pub fn should_fail(&self, dependency_id: &str) -> bool {
        self.config.enabled && self.is_broken(dependency_id)
    }
}

impl Default for DependencyBreaker {
    fn default() -> Self {
        Self::new(DependencyBreakerConfig::default())
    }
}

impl MetricsSource for DependencyBreaker {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count(
                "dependency_breaker.broken_count",
                state.broken_until.len() as u64,
            ),
            ResilienceMetric::count("dependency_breaker.breaks", state.breaks),
            ResilienceMetric::count("dependency_breaker.recoveries", state.recoveries),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn breaker(duration_ms: u64) -> (DependencyBreaker, ManualClock) {
        let clock = ManualClock::new(0);
        let b = DependencyBreaker::with_clock(
            DependencyBreakerConfig {
                enabled: true,
                break_duration_ms: duration_ms,
                ..Default::default()
            },
            Arc::new(clock.clone()),
        );
        (b, clock)
    }

    #[test]
    fn break_lasts_for_duration() {
        let (b, clock) = breaker(100);
        b.break_dependency("db");
        assert!(b.is_broken("db"));
        assert!(b.should_fail("db"));
        assert!(!b.is_broken("cache"));
        clock.advance(100);
        assert!(!b.is_broken("db"));
    }

    #[test]
    fn lazy_expiry_counts_recovery() {
        let (b, clock) = breaker(10);
        b.break_dependency("db");
        clock.advance(10);
        assert!(!b.is_broken("db"));
        let recoveries = b
            .metrics()
            .into_iter()
            .find(|m| m.name == "dependency_breaker.recoveries")
            .unwrap();
        assert!((recoveries.value - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn repair_clears_break() {
        let (b, _) = breaker(10_000);
        b.break_dependency("db");
        b.repair("db");
        assert!(!b.is_broken("db"));
    }

    #[test]
    fn disabled_breaker_ignores_breaks() {
        let b = DependencyBreaker::default();
        b.break_dependency("db");
        assert!(!b.is_broken("db"));
        assert!(!b.should_fail("db"));
        assert!(!b.maybe_break("db"));
    }

    #[test]
    fn maybe_break_with_certain_rate() {
        let b = DependencyBreaker::new(DependencyBreakerConfig {
            enabled: true,
            break_rate: 1.0,
            seed: Some(4),
            ..Default::default()
        });
        assert!(b.maybe_break("queue"));
        assert!(b.is_broken("queue"));
    }
}
