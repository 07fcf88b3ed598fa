//! Backoff strategies and a stateful backoff sequencer
//!
//! [`BackoffStrategy::delay_ms`] is the pure delay function shared with the
//! retry engine. [`BackoffEngine`] keeps an attempt counter across calls for
//! manual sequencing (restart throttling, reconnect loops) until
//! [`BackoffEngine::reset`].

use application::MetricsSource;
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::rng::SeededRng;

/// How the delay grows with the attempt number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `base * (attempt + 1)`
    Linear,
    /// `base * multiplier^attempt`
    #[default]
    Exponential,
    /// Exponential, then shifted by up to `± jitter_factor` of itself
    Jitter,
}

impl BackoffStrategy {
    /// Delay for a zero-based `attempt`
    ///
    /// `roll` is a uniform sample in `[0, 1)` and only matters for
    /// [`BackoffStrategy::Jitter`]. The result is capped at `max_ms` and
    /// floored at zero.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation
    )]
    pub fn delay_ms(
        self,
        base_ms: u64,
        multiplier: f64,
        max_ms: u64,
        jitter_factor: f64,
        attempt: u32,
        roll: f64,
    ) -> u64 {
        let base = base_ms as f64;
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let raw = match self {
            Self::Linear => base * f64::from(attempt.saturating_add(1)),
            Self::Exponential => base * multiplier.powi(exponent),
            Self::Jitter => {
                let exp = base * multiplier.powi(exponent);
                exp + exp * jitter_factor * roll.mul_add(2.0, -1.0)
            },
        };
        let capped = raw.min(max_ms as f64).max(0.0);
        if capped.is_nan() { 0 } else { capped.floor() as u64 }
    }
}

/// Configuration for a [`BackoffEngine`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay growth strategy
    #[serde(default)]
    pub strategy: BackoffStrategy,

    /// Base delay in milliseconds
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,

    /// Delay cap in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,

    /// Jitter amplitude as a fraction of the exponential delay
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,

    /// Seed for jitter rolls; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

const fn default_base_ms() -> u64 {
    100
}

const fn default_max_ms() -> u64 {
    30_000
}

const fn default_jitter_factor() -> f64 {
    0.2
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::default(),
            base_ms: default_base_ms(),
            max_ms: default_max_ms(),
            jitter_factor: default_jitter_factor(),
            seed: None,
        }
    }
}

#[derive(Debug)]
struct BackoffState {
    attempt: u32,
    delays: u64,
    total_ms: u64,
    rng: SeededRng,
}

/// Stateful backoff sequencer
#[derive(Debug)]
pub struct BackoffEngine {
    config: BackoffConfig,
    state: Mutex<BackoffState>,
}

impl BackoffEngine {
    /// Creates an engine with the given configuration
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        let rng = SeededRng::new(config.seed);
        Self {
            config,
            state: Mutex::new(BackoffState {
                attempt: 0,
                delays: 0,
                total_ms: 0,
                rng,
            }),
        }
    }

    fn compute(&self, state: &mut BackoffState) -> u64 {
        let roll = state.rng.next_f64();
        let ms = self.config.strategy.delay_ms(
            self.config.base_ms,
            2.0,
            self.config.max_ms,
            self.config.jitter_factor,
            state.attempt,
            roll,
        );
        state.delays += 1;
        state.total_ms = state.total_ms.saturating_add(ms);
        ms
    }

    /// Delay for the current attempt without advancing it
    pub fn delay_ms(&self) -> u64 {
        let mut state = self.state.lock();
        self.compute(&mut state)
    }

    /// Delay for the current attempt, then advances the attempt counter
    pub fn next_attempt(&self) -> u64 {
        let mut state = self.state.lock();
        let ms = self.compute(&mut state);
        state.attempt = state.attempt.saturating_add(1);
        ms
    }

    /// Resets the attempt counter
    pub fn reset(&self) {
        self.state.lock().attempt = 0;
    }

    /// Current attempt counter
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.state.lock().attempt
    }
}

impl Default for BackoffEngine {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

impl MetricsSource for BackoffEngine {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("backoff_engine.attempt", u64::from(state.attempt)),
            ResilienceMetric::count("backoff_engine.delays", state.delays),
            ResilienceMetric::millis("backoff_engine.total_ms", state.total_ms),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_grows_by_base() {
        let s = BackoffStrategy::Linear;
        assert_eq!(s.delay_ms(100, 2.0, 10_000, 0.0, 0, 0.5), 100);
        assert_eq!(s.delay_ms(100, 2.0, 10_000, 0.0, 1, 0.5), 200);
        assert_eq!(s.delay_ms(100, 2.0, 10_000, 0.0, 4, 0.5), 500);
    }

    #[test]
    fn exponential_doubles() {
        let s = BackoffStrategy::Exponential;
        assert_eq!(s.delay_ms(100, 2.0, 10_000, 0.0, 0, 0.5), 100);
        assert_eq!(s.delay_ms(100, 2.0, 10_000, 0.0, 1, 0.5), 200);
        assert_eq!(s.delay_ms(100, 2.0, 10_000, 0.0, 3, 0.5), 800);
    }

    #[test]
    fn delay_is_capped() {
        let s = BackoffStrategy::Exponential;
        assert_eq!(s.delay_ms(100, 2.0, 1_000, 0.0, 20, 0.5), 1_000);
        assert_eq!(s.delay_ms(100, 2.0, 1_000, 0.0, u32::MAX, 0.5), 1_000);
    }

    #[test]
    fn jitter_stays_within_factor() {
        let s = BackoffStrategy::Jitter;
        let low = s.delay_ms(1_000, 2.0, 100_000, 0.2, 0, 0.0);
        let mid = s.delay_ms(1_000, 2.0, 100_000, 0.2, 0, 0.5);
        let high = s.delay_ms(1_000, 2.0, 100_000, 0.2, 0, 0.999_999);
        assert_eq!(low, 800);
        assert_eq!(mid, 1_000);
        assert!((1_199..=1_200).contains(&high));
    }

    #[test]
    fn jitter_never_negative() {
        let s = BackoffStrategy::Jitter;
        assert_eq!(s.delay_ms(100, 2.0, 1_000, 5.0, 0, 0.0), 0);
    }

    #[test]
    fn engine_attempt_persists_until_reset() {
        let engine = BackoffEngine::new(BackoffConfig {
            strategy: BackoffStrategy::Exponential,
            base_ms: 10,
            ..Default::default()
        });
        assert_eq!(engine.next_attempt(), 10);
        assert_eq!(engine.next_attempt(), 20);
        assert_eq!(engine.next_attempt(), 40);
        assert_eq!(engine.attempt(), 3);
        engine.reset();
        assert_eq!(engine.attempt(), 0);
        assert_eq!(engine.next_attempt(), 10);
    }

    #[test]
    fn delay_ms_does_not_advance() {
        let engine = BackoffEngine::default();
        assert_eq!(engine.delay_ms(), 100);
        assert_eq!(engine.delay_ms(), 100);
        assert_eq!(engine.attempt(), 0);
    }

    #[test]
    fn seeded_jitter_is_reproducible() {
        let config = BackoffConfig {
            strategy: BackoffStrategy::Jitter,
            seed: Some(11),
            ..Default::default()
        };
        let a = BackoffEngine::new(config.clone());
        let b = BackoffEngine::new(config);
        for _ in 0..10 {
            assert_eq!(a.next_attempt(), b.next_attempt());
        }
    }

    #[test]
    fn metrics_track_totals() {
        let engine = BackoffEngine::new(BackoffConfig {
            base_ms: 10,
            ..Default::default()
        });
        engine.next_attempt();
        engine.next_attempt();
        let metrics = engine.metrics();
        let total = metrics
            .iter()
            .find(|m| m.name == "backoff_engine.total_ms")
            .unwrap();
        assert!((total.value - 30.0).abs() < f64::EPSILON);
    }
}
