//! Idempotency guard: remembers request keys for a TTL
//!
//! The key map is bounded. When full, expired keys are dropped first, then the
//! oldest recorded keys. Re-recording a key refreshes its expiry but keeps its
//! original age for eviction.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use application::{Clock, MetricsSource};
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::system_clock;

/// Configuration for an [`IdempotencyGuard`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyGuardConfig {
    /// Most keys remembered at once
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,

    /// How long a key is remembered, in milliseconds
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

const fn default_max_keys() -> usize {
    10_000
}

const fn default_ttl_ms() -> u64 {
    86_400_000
}

impl Default for IdempotencyGuardConfig {
    fn default() -> Self {
        Self {
            max_keys: default_max_keys(),
            ttl_ms: default_ttl_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SeenKey {
    expires_ms: u64,
    order: u64,
}

#[derive(Debug, Default)]
struct IdempotencyState {
    seen: HashMap<String, SeenKey>,
    by_age: BTreeMap<u64, String>,
    next_order: u64,
    accepted: u64,
    duplicates: u64,
}

impl IdempotencyState {
    fn forget(&mut self, key: &str) {
        if let Some(entry) = self.seen.remove(key) {
            self.by_age.remove(&entry.order);
        }
    }

    fn make_room(&mut self, now_ms: u64, max_keys: usize) {
        if self.seen.len() < max_keys {
            return;
        }
        let expired: Vec<String> = self
            .seen
            .iter()
            .filter(|(_, entry)| now_ms >= entry.expires_ms)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.forget(key);
        }
        while self.seen.len() >= max_keys {
            let Some((_, oldest)) = self.by_age.pop_first() else {
                break;
            };
            self.seen.remove(&oldest);
        }
    }
}

pub struct IdempotencyGuard {
    config: IdempotencyGuardConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<IdempotencyState>,
}

impl fmt::Debug for IdempotencyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdempotencyGuard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IdempotencyGuard {
    #[must_use]
    pub fn new(config: IdempotencyGuardConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    #[must_use]
    pub fn with_clock(config: IdempotencyGuardConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(IdempotencyState::default()),
        }
    }

    /// Whether `key` was recorded and has not expired
    pub fn is_duplicate(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        match state.seen.get(key).copied() {
            None => false,
            Some(entry) if now >= entry.expires_ms => {
                state.forget(key);
                false
            },
            Some(_) => {
                state.duplicates += 1;
                debug!(key = %key, "Duplicate request");
                true
            },
        }
    }

    /// Remembers `key` for `ttl_ms`
    pub fn record(&self, key: &str) {
        let now = self.clock.now_ms();
        let expires_ms = now.saturating_add(self.config.ttl_ms);
        let mut state = self.state.lock();
        if let Some(entry) = state.seen.get_mut(key) {
            entry.expires_ms = expires_ms;
        } else {
            state.make_room(now, self.config.max_keys.max(1));
            let order = state.next_order;
            state.next_order += 1;
            state.by_age.insert(order, key.to_string());
            state
                .seen
                .insert(key.to_string(), SeenKey { expires_ms, order });
        }
        state.accepted += 1;
    }

    /// Keys currently remembered, including expired ones not yet swept
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.state.lock().seen.len()
    }
}

impl Default for IdempotencyGuard {
    fn default() -> Self {
        Self::new(IdempotencyGuardConfig::default())
    }
}

impl MetricsSource for IdempotencyGuard {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("idempotency_guard.keys", state.seen.len() as u64),
            ResilienceMetric::count("idempotency_guard.accepted", state.accepted),
            ResilienceMetric::count("idempotency_guard.duplicates", state.duplicates),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn guard(max_keys: usize, ttl_ms: u64) -> (IdempotencyGuard, ManualClock) {
        let clock = ManualClock::new(0);
        let g = IdempotencyGuard::with_clock(
            IdempotencyGuardConfig { max_keys, ttl_ms },
            Arc::new(clock.clone()),
        );
        (g, clock)
    }

    #[test]
    fn detects_duplicates_until_ttl() {
        let (g, clock) = guard(10, 100);
        assert!(!g.is_duplicate("req-1"));
        g.record("req-1");
        assert!(g.is_duplicate("req-1"));
        clock.advance(100);
        assert!(!g.is_duplicate("req-1"));
        assert_eq!(g.key_count(), 0);
    }

    #[test]
    fn evicts_oldest_when_full() {
        let (g, _) = guard(2, 1_000);
        g.record("a");
        g.record("b");
        g.record("c");
        assert!(!g.is_duplicate("a"));
        assert!(g.is_duplicate("b"));
        assert!(g.is_duplicate("c"));
    }

    #[test]
    fn expired_keys_evicted_before_live_ones() {
        let (g, clock) = guard(2, 100);
        g.record("old");
        clock.advance(50);
        g.record("live");
        clock.advance(60);
        g.record("new");
        assert!(g.is_duplicate("live"));
        assert!(g.is_duplicate("new"));
        assert_eq!(g.key_count(), 2);
    }

    #[test]
    fn rerecord_keeps_age() {
        let (g, _) = guard(2, 1_000);
        g.record("a");
        g.record("b");
        g.record("a");
        g.record("c");
        assert!(!g.is_duplicate("a"));
        assert!(g.is_duplicate("b"));
    }
}
