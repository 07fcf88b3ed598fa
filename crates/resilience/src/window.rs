//! Sliding-window event log shared by the windowed budgets

use std::collections::VecDeque;

/// Timestamps of recent events, oldest first
///
/// An event at `t` is inside the window at `now` while `t >= now - window_ms`.
#[derive(Debug, Default)]
pub(crate) struct SlidingLog {
    stamps: VecDeque<u64>,
}

impl SlidingLog {
    /// Drops events that fell out of the window
    pub(crate) fn prune(&mut self, now_ms: u64, window_ms: u64) {
        let window_start = now_ms.saturating_sub(window_ms);
        while self.stamps.front().is_some_and(|&t| t < window_start) {
            self.stamps.pop_front();
        }
    }

    /// Records an event at `now_ms` and prunes
    pub(crate) fn record(&mut self, now_ms: u64, window_ms: u64) {
        self.stamps.push_back(now_ms);
        self.prune(now_ms, window_ms);
    }

    /// Events inside the window at `now_ms`
    pub(crate) fn count(&mut self, now_ms: u64, window_ms: u64) -> usize {
        self.prune(now_ms, window_ms);
        self.stamps.len()
    }
}
