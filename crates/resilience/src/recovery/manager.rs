//! Recovery manager: a bounded ring of named checkpoints

use std::{fmt, sync::Arc};

use application::{Clock, MetricsSource};
use domain::{RecoveryCheckpoint, ResilienceMetric};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BoundedRing;
use crate::clock::system_clock;

/// Configuration for a [`RecoveryManager`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryManagerConfig {
    /// Checkpoints kept before the oldest is evicted
    #[serde(default = "default_max_checkpoints")]
    pub max_checkpoints: usize,

    /// Time budget for one recovery, in milliseconds
    #[serde(default = "default_recovery_timeout_ms")]
    pub recovery_timeout_ms: u64,

    /// Recovery attempts before giving up
    #[serde(default = "default_auto_retry_attempts")]
    pub auto_retry_attempts: u32,
}

const fn default_max_checkpoints() -> usize {
    32
}

const fn default_recovery_timeout_ms() -> u64 {
    30_000
}

const fn default_auto_retry_attempts() -> u32 {
    3
}

impl Default for RecoveryManagerConfig {
    fn default() -> Self {
        Self {
            max_checkpoints: default_max_checkpoints(),
            recovery_timeout_ms: default_recovery_timeout_ms(),
            auto_retry_attempts: default_auto_retry_attempts(),
        }
    }
}

#[derive(Debug)]
struct ManagerState<P> {
    checkpoints: BoundedRing<RecoveryCheckpoint<P>>,
    created: u64,
    recoveries: u64,
    failures: u64,
}

/// Checkpoint store
pub struct RecoveryManager<P = serde_json::Value> {
    config: RecoveryManagerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<ManagerState<P>>,
}

impl<P> fmt::Debug for RecoveryManager<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P: Clone> RecoveryManager<P> {
    /// Creates an empty manager
    #[must_use]
    pub fn new(config: RecoveryManagerConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Creates an empty manager reading time from `clock`
    #[must_use]
    pub fn with_clock(config: RecoveryManagerConfig, clock: Arc<dyn Clock>) -> Self {
        let checkpoints = BoundedRing::new(config.max_checkpoints);
        Self {
            config,
            clock,
            state: Mutex::new(ManagerState {
                checkpoints,
                created: 0,
                recoveries: 0,
                failures: 0,
            }),
        }
    }

    /// Records a checkpoint, evicting the oldest when full
    pub fn create_checkpoint(&self, id: impl Into<String>, payload: P) {
        let timestamp_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        let sequence = state.checkpoints.take_sequence();
        let id = id.into();
        debug!(checkpoint = %id, sequence, "Checkpoint created");
        state.checkpoints.push(RecoveryCheckpoint {
            id,
            sequence,
            timestamp_ms,
            payload,
        });
        state.created += 1;
    }

    /// Most recently pushed checkpoint
    #[must_use]
    pub fn latest_checkpoint(&self) -> Option<RecoveryCheckpoint<P>> {
        self.state.lock().checkpoints.latest().cloned()
    }

    /// Checkpoint by id; the newest wins when ids repeat
    #[must_use]
    pub fn checkpoint(&self, id: &str) -> Option<RecoveryCheckpoint<P>> {
        self.state
            .lock()
            .checkpoints
            .iter()
            .rev()
            .find(|c| c.id == id)
            .cloned()
    }

    /// All retained checkpoints, oldest first
    #[must_use]
    pub fn checkpoints(&self) -> Vec<RecoveryCheckpoint<P>> {
        self.state.lock().checkpoints.iter().cloned().collect()
    }

    /// Counts a successful recovery
    pub fn record_recovery(&self) {
        self.state.lock().recoveries += 1;
    }

    /// Counts a failed recovery
    pub fn record_recovery_failure(&self) {
        self.state.lock().failures += 1;
    }

    /// Configured recovery time budget
    #[must_use]
    pub const fn recovery_timeout_ms(&self) -> u64 {
        self.config.recovery_timeout_ms
    }

    /// Configured recovery attempts
    #[must_use]
    pub const fn auto_retry_attempts(&self) -> u32 {
        self.config.auto_retry_attempts
    }
}

impl<P: Clone> Default for RecoveryManager<P> {
    fn default() -> Self {
        Self::new(RecoveryManagerConfig::default())
    }
}

impl<P> MetricsSource for RecoveryManager<P> {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("recovery_manager.checkpoints", state.checkpoints.len() as u64),
            ResilienceMetric::count("recovery_manager.recoveries", state.recoveries),
            ResilienceMetric::count("recovery_manager.failures", state.failures),
            ResilienceMetric::count("recovery_manager.checkpoints_created", state.created),
        ]
    }
}
