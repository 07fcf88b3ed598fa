//! Latency injector: probabilistic random delay

use std::time::Duration;

use application::MetricsSource;
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::rng::SeededRng;

/// Configuration for a [`LatencyInjector`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyInjectorConfig {
    /// Master switch
    #[serde(default)]
    pub enabled: bool,

    /// Shortest injected delay in milliseconds
    #[serde(default = "default_min_ms")]
    pub min_ms: u64,

    /// Longest injected delay in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,

    /// Chance of injecting a delay on each call
    #[serde(default = "default_inject_rate")]
    pub inject_rate: f64,

    /// Seed for rolls and durations; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

const fn default_min_ms() -> u64 {
    10
}

const fn default_max_ms() -> u64 {
    200
}

const fn default_inject_rate() -> f64 {
    0.2
}

impl Default for LatencyInjectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_ms: default_min_ms(),
            max_ms: default_max_ms(),
            inject_rate: default_inject_rate(),
            seed: None,
        }
    }
}

#[derive(Debug)]
struct LatencyState {
    rng: SeededRng,
    injected: u64,
    total_ms: u64,
}

/// Probabilistic delay injector
#[derive(Debug)]
pub struct LatencyInjector {
    config: LatencyInjectorConfig,
    state: Mutex<LatencyState>,
}

impl LatencyInjector {
    /// Creates an injector with the given configuration
    #[must_use]
    pub fn new(config: LatencyInjectorConfig) -> Self {
        let rng = SeededRng::new(config.seed);
        Self {
            config,
            state: Mutex::new(LatencyState {
                rng,
                injected: 0,
                total_ms: 0,
            }),
        }
    }

    /// Whether injection is switched on
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Rolls for a delay and returns it without sleeping; zero means none
    pub fn delay_ms(&self) -> u64 {
        if !self.config.enabled {
            return 0;
        }
        let mut state = self.state.lock();
        if !state.rng.chance(self.config.inject_rate) {
            return 0;
        }
        let ms = state
            .rng
            .range_inclusive(self.config.min_ms, self.config.max_ms);
        state.injected += 1;
        state.total_ms = state.total_ms.saturating_add(ms);
        ms
    }

    /// Rolls for a delay and sleeps for it
    pub async fn inject(&self) {
        let ms = self.delay_ms();
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

impl Default for LatencyInjector {
    fn default() -> Self {
        Self::new(LatencyInjectorConfig::default())
    }
}

impl MetricsSource for LatencyInjector {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("latency_injector.injected", state.injected),
            ResilienceMetric::millis("latency_injector.total_ms", state.total_ms),
        ]
    }
}
