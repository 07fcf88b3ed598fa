//! Checkpoint, snapshot and replay event records
//!
//! All three are held in bounded in-memory rings by their owning primitive.
//! `sequence` is assigned in push order by the owner and breaks ties between
//! records that share a timestamp; payloads are opaque to the resilience layer.

use serde::{Deserialize, Serialize};

/// A named recovery checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryCheckpoint<P = serde_json::Value> {
    /// Caller-chosen checkpoint id
    pub id: String,
    /// Push order within the owning ring
    pub sequence: u64,
    /// Monotonic clock reading at creation, in milliseconds
    pub timestamp_ms: u64,
    /// Opaque payload
    pub payload: P,
}

/// A versioned state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot<S = serde_json::Value> {
    /// Caller-chosen snapshot id
    pub id: String,
    /// Push order within the owning ring
    pub sequence: u64,
    /// Caller-supplied state version
    pub version: u64,
    /// Monotonic clock reading at creation, in milliseconds
    pub timestamp_ms: u64,
    /// Opaque state
    pub state: S,
}

/// An event recorded for replay after a checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayEvent<P = serde_json::Value> {
    /// Caller-chosen event id
    pub id: String,
    /// Push order within the owning ring
    pub sequence: u64,
    /// Monotonic clock reading at recording, in milliseconds
    pub timestamp_ms: u64,
    /// Opaque payload
    pub payload: P,
}

impl<P> ReplayEvent<P> {
    /// Whether the event happened at or after the checkpoint
    pub fn is_at_or_after<C>(&self, checkpoint: &RecoveryCheckpoint<C>) -> bool {
        self.timestamp_ms >= checkpoint.timestamp_ms
    }
}
