//! Fallback engine: one active tier, stepped down on failure and up after a cooldown

use std::{fmt, sync::Arc};

use application::{Clock, MetricsSource};
use domain::{FallbackTier, MetricUnit, ResilienceMetric};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::system_clock;

/// Configuration for a [`FallbackEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackEngineConfig {
    /// Minimum time on a tier before [`FallbackEngine::upgrade`] may leave it
    #[serde(default = "default_tier_cooldown_ms")]
    pub tier_cooldown_ms: u64,
}

const fn default_tier_cooldown_ms() -> u64 {
    5_000
}

impl Default for FallbackEngineConfig {
    fn default() -> Self {
        Self {
            tier_cooldown_ms: default_tier_cooldown_ms(),
        }
    }
}

#[derive(Debug)]
struct FallbackState {
    tier: FallbackTier,
    tier_since_ms: u64,
    fallbacks: u64,
    recoveries: u64,
}

/// Tiered fallback selector
pub struct FallbackEngine {
    config: FallbackEngineConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<FallbackState>,
}

impl fmt::Debug for FallbackEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackEngine")
            .field("config", &self.config)
            .field("tier", &self.tier())
            .finish_non_exhaustive()
    }
}

impl FallbackEngine {
    /// Creates an engine on the primary tier
    #[must_use]
    pub fn new(config: FallbackEngineConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Creates an engine reading time from `clock`
    #[must_use]
    pub fn with_clock(config: FallbackEngineConfig, clock: Arc<dyn Clock>) -> Self {
        let tier_since_ms = clock.now_ms();
        Self {
            config,
            clock,
            state: Mutex::new(FallbackState {
                tier: FallbackTier::Primary,
                tier_since_ms,
                fallbacks: 0,
                recoveries: 0,
            }),
        }
    }

    /// Active tier
    #[must_use]
    pub fn tier(&self) -> FallbackTier {
        self.state.lock().tier
    }

    /// Whether the active tier is below primary
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.tier() != FallbackTier::Primary
    }

    /// Steps one tier toward minimal; a no-op on minimal
    pub fn downgrade(&self) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        if let Some(next) = state.tier.lower() {
            info!(from = %state.tier, to = %next, "Fallback tier lowered");
            state.tier = next;
            state.tier_since_ms = now;
            state.fallbacks += 1;
        }
    }

    /// Steps one tier toward primary once the cooldown has elapsed
    pub fn upgrade(&self) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        let Some(next) = state.tier.higher() else {
            return;
        };
        if now.saturating_sub(state.tier_since_ms) < self.config.tier_cooldown_ms {
            return;
        }
        info!(from = %state.tier, to = %next, "Fallback tier raised");
        state.tier = next;
        state.tier_since_ms = now;
        state.recoveries += 1;
    }

    /// Sets the tier unconditionally and restarts the cooldown
    pub fn set_tier(&self, tier: FallbackTier) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        state.tier = tier;
        state.tier_since_ms = now;
    }
}

impl Default for FallbackEngine {
    fn default() -> Self {
        Self::new(FallbackEngineConfig::default())
    }
}

impl MetricsSource for FallbackEngine {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::new(
                "fallback_engine.tier",
                f64::from(state.tier.index()),
                MetricUnit::Enum,
            ),
            ResilienceMetric::count("fallback_engine.fallbacks", state.fallbacks),
            ResilienceMetric::count("fallback_engine.recoveries", state.recoveries),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn engine(cooldown_ms: u64) -> (FallbackEngine, ManualClock) {
        let clock = ManualClock::new(0);
        let e = FallbackEngine::with_clock(
            FallbackEngineConfig {
                tier_cooldown_ms: cooldown_ms,
            },
            Arc::new(clock.clone()),
        );
        (e, clock)
    }

    #[test]
    fn four_downgrades_stop_at_minimal() {
        let (e, _) = engine(0);
        for _ in 0..4 {
            e.downgrade();
        }
        assert_eq!(e.tier(), FallbackTier::Minimal);
        let fallbacks = &e.metrics()[1];
        assert!((fallbacks.value - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn upgrade_waits_for_cooldown() {
        let (e, clock) = engine(5_000);
        e.downgrade();
        e.upgrade();
        assert_eq!(e.tier(), FallbackTier::Secondary);
        clock.advance(4_999);
        e.upgrade();
        assert_eq!(e.tier(), FallbackTier::Secondary);
        clock.advance(1);
        e.upgrade();
        assert_eq!(e.tier(), FallbackTier::Primary);
        assert!(!e.is_degraded());
    }

    #[test]
    fn upgrade_on_primary_is_noop() {
        let (e, clock) = engine(0);
        clock.advance(10);
        e.upgrade();
        assert_eq!(e.tier(), FallbackTier::Primary);
    }

    #[test]
    fn set_tier_restarts_cooldown() {
        let (e, clock) = engine(100);
        clock.advance(500);
        e.set_tier(FallbackTier::Degraded);
        assert!(e.is_degraded());
        e.upgrade();
        assert_eq!(e.tier(), FallbackTier::Degraded);
        clock.advance(100);
        e.upgrade();
        assert_eq!(e.tier(), FallbackTier::Secondary);
    }
}
