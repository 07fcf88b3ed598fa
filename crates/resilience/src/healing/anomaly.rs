//! Z-score anomaly detection over a bounded sample window

use std::collections::VecDeque;

use application::MetricsSource;
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for an [`AnomalyDetector`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetectorConfig {
    /// Samples kept for the baseline
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Distance from the mean, in standard deviations, that counts as anomalous
    #[serde(default = "default_threshold_sigma")]
    pub threshold_sigma: f64,

    /// Samples needed before anything is flagged
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

const fn default_window_size() -> usize {
    100
}

const fn default_threshold_sigma() -> f64 {
    3.0
}

const fn default_min_samples() -> usize {
    10
}

impl Default for AnomalyDetectorConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            threshold_sigma: default_threshold_sigma(),
            min_samples: default_min_samples(),
        }
    }
}

#[derive(Debug, Default)]
struct DetectorState {
    samples: VecDeque<f64>,
    total_samples: u64,
    anomalies: u64,
}

#[derive(Debug)]
pub struct AnomalyDetector {
    config: AnomalyDetectorConfig,
    state: Mutex<DetectorState>,
}

impl AnomalyDetector {
    #[must_use]
    pub fn new(config: AnomalyDetectorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(DetectorState::default()),
        }
    }

    /// Adds a sample to the baseline window
    pub fn record(&self, value: f64) {
        let mut state = self.state.lock();
        while state.samples.len() >= self.config.window_size.max(1) {
            state.samples.pop_front();
        }
        state.samples.push_back(value);
        state.total_samples += 1;
    }

    /// Whether `value` lies `threshold_sigma` or more from the window mean
    ///
    /// A flat baseline uses a standard deviation of 1.
    #[allow(clippy::cast_precision_loss)]
    pub fn is_anomaly(&self, value: f64) -> bool {
        let mut state = self.state.lock();
        if state.samples.len() < self.config.min_samples || state.samples.is_empty() {
            return false;
        }
        let n = state.samples.len() as f64;
        let mean = state.samples.iter().sum::<f64>() / n;
        let variance = state
            .samples
            .iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f64>()
            / n;
        let std_dev = variance.sqrt();
        let std_dev = if std_dev > 0.0 { std_dev } else { 1.0 };
        let z = (value - mean).abs() / std_dev;
        if z >= self.config.threshold_sigma {
            state.anomalies += 1;
            debug!(value, mean, z, "Anomaly detected");
            return true;
        }
        false
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(AnomalyDetectorConfig::default())
    }
}

impl MetricsSource for AnomalyDetector {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("anomaly_detector.samples", state.samples.len() as u64),
            ResilienceMetric::count("anomaly_detector.anomalies", state.anomalies),
            ResilienceMetric::count("anomaly_detector.total_samples", state.total_samples),
        ]
    }
}
