//! Recovery: checkpoints, event replay, state snapshots and restart throttling
//!
//! Checkpoints, events and snapshots live in bounded in-memory rings. When a
//! ring is full the oldest record is evicted. Every record carries a
//! `sequence` assigned in push order, which orders records that share a
//! timestamp.

mod auto_restart;
mod manager;
mod replay;
mod state_restorer;

pub use auto_restart::{AutoRestart, AutoRestartConfig, MAX_RESTART_BACKOFF_MS};
pub use manager::{RecoveryManager, RecoveryManagerConfig};
pub use replay::{ReplayEngine, ReplayEngineConfig};
pub use state_restorer::{StateRestorer, StateRestorerConfig};

use std::collections::VecDeque;

/// Fixed-capacity FIFO ring with a push-order sequence counter
#[derive(Debug)]
pub(crate) struct BoundedRing<T> {
    items: VecDeque<T>,
    capacity: usize,
    next_sequence: u64,
}

impl<T> BoundedRing<T> {
    /// Ring holding at most `capacity` items; never less than one
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            next_sequence: 0,
        }
    }

    /// Sequence number the next pushed item should carry
    pub(crate) fn take_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    /// Appends `item`, evicting the oldest items while full
    pub(crate) fn push(&mut self, item: T) -> usize {
        let mut evicted = 0;
        while self.items.len() >= self.capacity {
            self.items.pop_front();
            evicted += 1;
        }
        self.items.push_back(item);
        evicted
    }

    pub(crate) fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub(crate) fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }

    pub(crate) fn as_deque(&self) -> &VecDeque<T> {
        &self.items
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}
