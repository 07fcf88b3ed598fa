//! Metrics source port

use domain::ResilienceMetric;

/// A component that reports its counters and gauges
pub trait MetricsSource {
    /// Snapshot of the component's metrics
    fn metrics(&self) -> Vec<ResilienceMetric>;
}
