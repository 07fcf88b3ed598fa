//! State restorer: a bounded ring of versioned snapshots

use std::{fmt, sync::Arc};

use application::{Clock, MetricsSource};
use domain::{ResilienceMetric, StateSnapshot};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::BoundedRing;
use crate::clock::system_clock;

/// Configuration for a [`StateRestorer`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRestorerConfig {
    /// Snapshots kept before the oldest is evicted
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: usize,

    /// Time budget for one restore, in milliseconds
    #[serde(default = "default_restore_timeout_ms")]
    pub restore_timeout_ms: u64,
}

const fn default_max_snapshots() -> usize {
    16
}

const fn default_restore_timeout_ms() -> u64 {
    10_000
}

impl Default for StateRestorerConfig {
    fn default() -> Self {
        Self {
            max_snapshots: default_max_snapshots(),
            restore_timeout_ms: default_restore_timeout_ms(),
        }
    }
}

#[derive(Debug)]
struct RestorerState<S> {
    snapshots: BoundedRing<StateSnapshot<S>>,
    created: u64,
    restores: u64,
    failures: u64,
}

/// Versioned snapshot store
pub struct StateRestorer<S = serde_json::Value> {
    config: StateRestorerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<RestorerState<S>>,
}

impl<S> fmt::Debug for StateRestorer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateRestorer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: Clone> StateRestorer<S> {
    #[must_use]
    pub fn new(config: StateRestorerConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    #[must_use]
    pub fn with_clock(config: StateRestorerConfig, clock: Arc<dyn Clock>) -> Self {
        let snapshots = BoundedRing::new(config.max_snapshots);
        Self {
            config,
            clock,
            state: Mutex::new(RestorerState {
                snapshots,
                created: 0,
                restores: 0,
                failures: 0,
            }),
        }
    }

    /// Stores a snapshot of `state` at `version`
    pub fn save_snapshot(&self, id: impl Into<String>, state: S, version: u64) {
        let timestamp_ms = self.clock.now_ms();
        let mut inner = self.state.lock();
        let sequence = inner.snapshots.take_sequence();
        inner.snapshots.push(StateSnapshot {
            id: id.into(),
            sequence,
            version,
            timestamp_ms,
            state,
        });
        inner.created += 1;
    }

    #[must_use]
    pub fn latest_snapshot(&self) -> Option<StateSnapshot<S>> {
        self.state.lock().snapshots.latest().cloned()
    }

    /// Snapshot by id; the newest wins when ids repeat
    #[must_use]
    pub fn snapshot(&self, id: &str) -> Option<StateSnapshot<S>> {
        self.state
            .lock()
            .snapshots
            .iter()
            .rev()
            .find(|s| s.id == id)
            .cloned()
    }

    pub fn record_restore(&self) {
        self.state.lock().restores += 1;
    }

    pub fn record_restore_failure(&self) {
        self.state.lock().failures += 1;
    }

    #[must_use]
    pub const fn restore_timeout_ms(&self) -> u64 {
        self.config.restore_timeout_ms
    }
}

impl<S: Clone> Default for StateRestorer<S> {
    fn default() -> Self {
        Self::new(StateRestorerConfig::default())
    }
}

impl<S> MetricsSource for StateRestorer<S> {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("state_restore.snapshots", state.snapshots.len() as u64),
            ResilienceMetric::count("state_restore.restores", state.restores),
            ResilienceMetric::count("state_restore.failures", state.failures),
            ResilienceMetric::count("state_restore.snapshots_created", state.created),
        ]
    }
}
