//! Isolation pool: keys hash to compartments with independent concurrency limits
//!
//! Each compartment owns an atomic in-flight counter, so contention in one
//! compartment never blocks callers routed to another.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use application::MetricsSource;
use domain::ResilienceMetric;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for an [`IsolationPool`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationPoolConfig {
    /// Number of compartments
    #[serde(default = "default_compartments")]
    pub compartments: usize,

    /// In-flight limit per compartment
    #[serde(default = "default_max_concurrency_per_compartment")]
    pub max_concurrency_per_compartment: usize,
}

const fn default_compartments() -> usize {
    8
}

const fn default_max_concurrency_per_compartment() -> usize {
    4
}

impl Default for IsolationPoolConfig {
    fn default() -> Self {
        Self {
            compartments: default_compartments(),
            max_concurrency_per_compartment: default_max_concurrency_per_compartment(),
        }
    }
}

/// 32-bit rolling hash (`h * 31 + unit`) over the key's UTF-16 code units
#[must_use]
pub fn compartment_hash(key: &str) -> u32 {
    key.encode_utf16()
        .fold(0_i32, |h, unit| {
            h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(unit))
        })
        .unsigned_abs()
}

/// Fixed set of compartments with per-compartment limits
#[derive(Debug)]
pub struct IsolationPool {
    config: IsolationPoolConfig,
    in_flight: Vec<AtomicUsize>,
    dispatched: AtomicU64,
    rejected: AtomicU64,
}

impl IsolationPool {
    /// Creates a pool; at least one compartment is always allocated
    #[must_use]
    pub fn new(config: IsolationPoolConfig) -> Self {
        let in_flight = (0..config.compartments.max(1))
            .map(|_| AtomicUsize::new(0))
            .collect();
        Self {
            config,
            in_flight,
            dispatched: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Compartment index for `key`
    #[must_use]
    pub fn compartment_for(&self, key: &str) -> usize {
        compartment_hash(key) as usize % self.in_flight.len()
    }

    /// Takes a slot in the key's compartment if one is free
    pub fn try_acquire(&self, key: &str) -> bool {
        let index = self.compartment_for(key);
        let limit = self.config.max_concurrency_per_compartment;
        let acquired = self.in_flight[index]
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < limit).then_some(current + 1)
            })
            .is_ok();
        if acquired {
            self.dispatched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(compartment = index, "Compartment full");
        }
        acquired
    }

    /// Returns a slot to the key's compartment; never goes below zero
    pub fn release(&self, key: &str) {
        let index = self.compartment_for(key);
        let _ = self.in_flight[index].fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
            Some(v.saturating_sub(1))
        });
    }

    /// In-flight count of one compartment, or of the whole pool for `None`
    #[must_use]
    pub fn in_flight(&self, compartment: Option<usize>) -> usize {
        match compartment {
            Some(index) => self
                .in_flight
                .get(index)
                .map_or(0, |c| c.load(Ordering::Acquire)),
            None => self
                .in_flight
                .iter()
                .map(|c| c.load(Ordering::Acquire))
                .sum(),
        }
    }
}

impl Default for IsolationPool {
    fn default() -> Self {
        Self::new(IsolationPoolConfig::default())
    }
}

impl MetricsSource for IsolationPool {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let mut metrics = vec![
            ResilienceMetric::count(
                "isolation_pool.dispatched",
                self.dispatched.load(Ordering::Relaxed),
            ),
            ResilienceMetric::count("isolation_pool.rejected", self.rejected.load(Ordering::Relaxed)),
            ResilienceMetric::count("isolation_pool.total_in_flight", self.in_flight(None) as u64),
        ];
        metrics.extend(self.in_flight.iter().enumerate().map(|(i, c)| {
            ResilienceMetric::count(
                format!("isolation_pool.compartment_{i}_in_flight"),
                c.load(Ordering::Acquire) as u64,
            )
        }));
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_known_values() {
        assert_eq!(compartment_hash(""), 0);
        assert_eq!(compartment_hash("a"), 97);
        assert_eq!(compartment_hash("ab"), 97 * 31 + 98);
    }

    #[test]
    fn hash_wraps_without_panicking() {
        let long = "z".repeat(10_000);
        let _ = compartment_hash(&long);
    }

    #[test]
    fn same_key_same_compartment() {
        let pool = IsolationPool::default();
        assert_eq!(pool.compartment_for("tenant-a"), pool.compartment_for("tenant-a"));
        assert!(pool.compartment_for("tenant-a") < 8);
    }

    #[test]
    fn compartment_limit_is_enforced() {
        let pool = IsolationPool::new(IsolationPoolConfig {
            compartments: 4,
            max_concurrency_per_compartment: 2,
        });
        assert!(pool.try_acquire("k"));
        assert!(pool.try_acquire("k"));
        assert!(!pool.try_acquire("k"));
        pool.release("k");
        assert!(pool.try_acquire("k"));
    }

    #[test]
    fn compartments_are_independent() {
        let pool = IsolationPool::new(IsolationPoolConfig {
            compartments: 8,
            max_concurrency_per_compartment: 1,
        });
        let a = "a";
        let b = (b'b'..=b'z')
            .map(|c| (c as char).to_string())
            .find(|k| pool.compartment_for(k) != pool.compartment_for(a))
            .unwrap();
        assert!(pool.try_acquire(a));
        assert!(!pool.try_acquire(a));
        assert!(pool.try_acquire(&b));
        assert_eq!(pool.in_flight(None), 2);
        assert_eq!(pool.in_flight(Some(pool.compartment_for(a))), 1);
    }

    #[test]
    fn release_never_underflows() {
        let pool = IsolationPool::default();
        pool.release("x");
        assert_eq!(pool.in_flight(None), 0);
        assert_eq!(pool.in_flight(Some(99)), 0);
    }

    #[test]
    fn metrics_include_each_compartment() {
        let pool = IsolationPool::new(IsolationPoolConfig {
            compartments: 3,
            max_concurrency_per_compartment: 1,
        });
        let names: Vec<String> = pool.metrics().into_iter().map(|m| m.name).collect();
        assert!(names.contains(&"isolation_pool.compartment_2_in_flight".to_string()));
        assert_eq!(names.len(), 6);
    }
}
