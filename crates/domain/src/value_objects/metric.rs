//! Metric sample value object
//!
//! Every resilience primitive reports its counters and gauges as a flat list
//! of [`ResilienceMetric`] samples. This is the only observability contract
//! between the primitives and whatever sink the host installs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit attached to a metric sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricUnit {
    /// Monotonic counter or point-in-time count
    Count,
    /// Duration in milliseconds
    #[serde(rename = "ms")]
    Milliseconds,
    /// Size in bytes
    Bytes,
    /// Numeric level (degradation level, quality level)
    Level,
    /// Encoded enum (circuit state, fallback tier)
    Enum,
}

impl MetricUnit {
    /// Short label used in metric output
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Milliseconds => "ms",
            Self::Bytes => "bytes",
            Self::Level => "level",
            Self::Enum => "enum",
        }
    }
}

impl fmt::Display for MetricUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named metric sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceMetric {
    /// Dotted metric name, e.g. `circuit_breaker.trips`
    pub name: String,
    /// Sample value
    pub value: f64,
    /// Unit of the value
    pub unit: MetricUnit,
    /// Wall-clock time the sample was taken
    pub timestamp: DateTime<Utc>,
}

impl ResilienceMetric {
    /// Create a sample stamped with the current wall-clock time
    pub fn new(name: impl Into<String>, value: f64, unit: MetricUnit) -> Self {
        Self::at(name, value, unit, Utc::now())
    }

    /// Create a sample with an explicit timestamp
    pub fn at(
        name: impl Into<String>,
        value: f64,
        unit: MetricUnit,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            unit,
            timestamp,
        }
    }

    /// Create a count sample
    #[allow(clippy::cast_precision_loss)]
    pub fn count(name: impl Into<String>, value: u64) -> Self {
        Self::new(name, value as f64, MetricUnit::Count)
    }

    /// Create a millisecond sample
    #[allow(clippy::cast_precision_loss)]
    pub fn millis(name: impl Into<String>, value: u64) -> Self {
        Self::new(name, value as f64, MetricUnit::Milliseconds)
    }
}

impl fmt::Display for ResilienceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} {}", self.name, self.value, self.unit)
    }
}
