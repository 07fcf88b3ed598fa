//! Failover manager: priority-ordered targets with health-based routing

use application::MetricsSource;
use domain::{FailoverTarget, ResilienceMetric};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Configuration for a [`FailoverManager`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverManagerConfig {
    /// Most targets the manager accepts
    #[serde(default = "default_max_targets")]
    pub max_targets: usize,

    /// Expected health check period, in milliseconds
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
}

const fn default_max_targets() -> usize {
    8
}

const fn default_health_check_interval_ms() -> u64 {
    10_000
}

impl Default for FailoverManagerConfig {
    fn default() -> Self {
        Self {
            max_targets: default_max_targets(),
            health_check_interval_ms: default_health_check_interval_ms(),
        }
    }
}

#[derive(Debug, Default)]
struct FailoverState {
    targets: Vec<FailoverTarget>,
    cursor: usize,
    failovers: u64,
    health_checks: u64,
}

impl FailoverState {
    fn healthy(&self) -> impl Iterator<Item = &FailoverTarget> {
        self.targets.iter().filter(|t| t.healthy)
    }
}

/// Owner of a set of failover targets
#[derive(Debug)]
pub struct FailoverManager {
    config: FailoverManagerConfig,
    state: Mutex<FailoverState>,
}

impl FailoverManager {
    #[must_use]
    pub fn new(config: FailoverManagerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(FailoverState::default()),
        }
    }

    /// Adds a target, keeping the list sorted by ascending priority
    ///
    /// Duplicate ids and targets beyond `max_targets` are ignored. Returns
    /// whether the target was added.
    pub fn register_target(&self, id: impl Into<String>, priority: i32, healthy: bool) -> bool {
        let id = id.into();
        let mut state = self.state.lock();
        if state.targets.len() >= self.config.max_targets || state.targets.iter().any(|t| t.id == id)
        {
            debug!(target_id = %id, "Failover target ignored");
            return false;
        }
        state.targets.push(FailoverTarget { id, priority, healthy });
        state.targets.sort_by_key(|t| t.priority);
        true
    }

    /// Updates the health of a registered target
    pub fn set_healthy(&self, id: &str, healthy: bool) {
        let mut state = self.state.lock();
        if let Some(target) = state.targets.iter_mut().find(|t| t.id == id) {
            if target.healthy != healthy {
                info!(target_id = %id, healthy, "Failover target health changed");
            }
            target.healthy = healthy;
        }
    }

    /// Healthy target with the lowest priority value
    #[must_use]
    pub fn primary(&self) -> Option<FailoverTarget> {
        self.state.lock().healthy().next().cloned()
    }

    /// Round-robin over healthy targets; counts a failover per call
    pub fn next(&self) -> Option<FailoverTarget> {
        let mut state = self.state.lock();
        let healthy = state.healthy().count();
        if healthy == 0 {
            return None;
        }
        let index = state.cursor % healthy;
        let target = state.healthy().nth(index).cloned();
        state.cursor = state.cursor.wrapping_add(1);
        state.failovers += 1;
        target
    }

    /// All targets in priority order
    #[must_use]
    pub fn targets(&self) -> Vec<FailoverTarget> {
        self.state.lock().targets.clone()
    }

    pub fn record_health_check(&self) {
        self.state.lock().health_checks += 1;
    }

    #[must_use]
    pub const fn health_check_interval_ms(&self) -> u64 {
        self.config.health_check_interval_ms
    }
}

impl Default for FailoverManager {
    fn default() -> Self {
        Self::new(FailoverManagerConfig::default())
    }
}

impl MetricsSource for FailoverManager {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("failover_manager.targets", state.targets.len() as u64),
            ResilienceMetric::count("failover_manager.healthy", state.healthy().count() as u64),
            ResilienceMetric::count("failover_manager.failovers", state.failovers),
            ResilienceMetric::count("failover_manager.health_checks", state.health_checks),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> FailoverManager {
        let m = FailoverManager::default();
        m.register_target("eu-west", 2, true);
        m.register_target("us-east", 1, true);
        m.register_target("ap-south", 3, true);
        m
    }

    #[test]
    fn targets_sorted_by_priority() {
        let ids: Vec<String> = manager().targets().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["us-east", "eu-west", "ap-south"]);
    }

    #[test]
    fn primary_skips_unhealthy() {
        let m = manager();
        assert_eq!(m.primary().unwrap().id, "us-east");
        m.set_healthy("us-east", false);
        assert_eq!(m.primary().unwrap().id, "eu-west");
    }

    #[test]
    fn next_round_robins_healthy_targets() {
        let m = manager();
        m.set_healthy("eu-west", false);
        let picks: Vec<String> = (0..4).map(|_| m.next().unwrap().id).collect();
        assert_eq!(picks, vec!["us-east", "ap-south", "us-east", "ap-south"]);
    }

    #[test]
    fn no_healthy_targets() {
        let m = FailoverManager::default();
        m.register_target("only", 1, false);
        assert!(m.primary().is_none());
        assert!(m.next().is_none());
    }

    #[test]
    fn duplicates_and_overflow_ignored() {
        let m = FailoverManager::new(FailoverManagerConfig {
            max_targets: 2,
            ..Default::default()
        });
        assert!(m.register_target("a", 1, true));
        assert!(!m.register_target("a", 0, true));
        assert!(m.register_target("b", 2, true));
        assert!(!m.register_target("c", 3, true));
        assert_eq!(m.targets().len(), 2);
    }

    #[test]
    fn metrics_count_failovers() {
        let m = manager();
        m.next();
        m.next();
        m.record_health_check();
        let values: Vec<f64> = m.metrics().into_iter().map(|x| x.value).collect();
        assert_eq!(values, vec![3.0, 3.0, 2.0, 1.0]);
    }
}
