//! Snapshot catalog with retention expiry and capacity eviction

use std::{collections::VecDeque, fmt, sync::Arc};

use application::{Clock, MetricsSource};
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::system_clock;

/// One catalog entry; the payload itself lives elsewhere
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: String,
    pub timestamp_ms: u64,
    /// Location of the stored payload
    pub payload_ref: String,
    pub size_bytes: u64,
}

/// Configuration for a [`SnapshotEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEngineConfig {
    /// Entries kept before the oldest is evicted
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: usize,

    /// Age after which an entry expires, in milliseconds
    #[serde(default = "default_retention_ms")]
    pub retention_ms: u64,
}

const fn default_max_snapshots() -> usize {
    64
}

const fn default_retention_ms() -> u64 {
    7 * 86_400_000
}

impl Default for SnapshotEngineConfig {
    fn default() -> Self {
        Self {
            max_snapshots: default_max_snapshots(),
            retention_ms: default_retention_ms(),
        }
    }
}

#[derive(Debug, Default)]
struct SnapshotState {
    records: VecDeque<SnapshotRecord>,
    created: u64,
    deleted: u64,
}

/// Snapshot catalog
pub struct SnapshotEngine {
    config: SnapshotEngineConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<SnapshotState>,
}

impl fmt::Debug for SnapshotEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SnapshotEngine {
    #[must_use]
    pub fn new(config: SnapshotEngineConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    #[must_use]
    pub fn with_clock(config: SnapshotEngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(SnapshotState::default()),
        }
    }

    /// Catalogs a snapshot after dropping expired and overflowing entries
    pub fn create(&self, id: impl Into<String>, payload_ref: impl Into<String>, size_bytes: u64) {
        let now = self.clock.now_ms();
        let cutoff = now.saturating_sub(self.config.retention_ms);
        let capacity = self.config.max_snapshots.max(1);
        let mut state = self.state.lock();
        while state.records.front().is_some_and(|r| r.timestamp_ms < cutoff) {
            state.records.pop_front();
            state.deleted += 1;
        }
        while state.records.len() >= capacity {
            state.records.pop_front();
            state.deleted += 1;
        }
        let record = SnapshotRecord {
            id: id.into(),
            timestamp_ms: now,
            payload_ref: payload_ref.into(),
            size_bytes,
        };
        debug!(snapshot = %record.id, size_bytes, "Snapshot cataloged");
        state.records.push_back(record);
        state.created += 1;
    }

    /// Entry by id; the newest wins when ids repeat
    #[must_use]
    pub fn get(&self, id: &str) -> Option<SnapshotRecord> {
        self.state
            .lock()
            .records
            .iter()
            .rev()
            .find(|r| r.id == id)
            .cloned()
    }

    #[must_use]
    pub fn latest(&self) -> Option<SnapshotRecord> {
        self.state.lock().records.back().cloned()
    }
}

impl Default for SnapshotEngine {
    fn default() -> Self {
        Self::new(SnapshotEngineConfig::default())
    }
}

impl MetricsSource for SnapshotEngine {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("snapshot_engine.snapshots", state.records.len() as u64),
            ResilienceMetric::count("snapshot_engine.created", state.created),
            ResilienceMetric::count("snapshot_engine.deleted", state.deleted),
        ]
    }
}
