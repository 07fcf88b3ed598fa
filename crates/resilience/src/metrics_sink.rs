//! Forwarding of metric snapshots to the `metrics` facade
//!
//! Nothing is recorded unless the host installs a recorder (a Prometheus
//! exporter, for instance). Each sample becomes a gauge labelled by unit.

use application::MetricsSource;
use domain::ResilienceMetric;

/// Publish a batch of samples as gauges
pub fn publish(samples: &[ResilienceMetric]) {
    for sample in samples {
        metrics::gauge!(sample.name.clone(), "unit" => sample.unit.as_str()).set(sample.value);
    }
}

/// Snapshot every source and publish the combined batch
///
/// Returns the number of samples published.
pub fn publish_all(sources: &[&dyn MetricsSource]) -> usize {
    let samples: Vec<ResilienceMetric> = sources.iter().flat_map(|s| s.metrics()).collect();
    publish(&samples);
    samples.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bulkhead::Bulkhead, circuit_breaker::CircuitBreaker};
    use domain::MetricUnit;

    use metrics::{
        Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Samples = Arc<Mutex<Vec<(String, String, f64)>>>;

    #[derive(Debug, Default)]
    struct CapturingRecorder {
        samples: Samples,
    }

    struct CapturedGauge {
        name: String,
        unit: String,
        samples: Samples,
    }

    impl GaugeFn for CapturedGauge {
        fn increment(&self, _value: f64) {}

        fn decrement(&self, _value: f64) {}

        fn set(&self, value: f64) {
            self.samples
                .lock()
                .push((self.name.clone(), self.unit.clone(), value));
        }
    }

    impl Recorder for CapturingRecorder {
        fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

        fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

        fn describe_histogram(
            &self,
            _key: KeyName,
            _unit: Option<Unit>,
            _description: SharedString,
        ) {
        }

        fn register_counter(&self, _key: &Key, _metadata: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
            let unit = key
                .labels()
                .find(|label| label.key() == "unit")
                .map(|label| label.value().to_string())
                .unwrap_or_default();
            Gauge::from_arc(Arc::new(CapturedGauge {
                name: key.name().to_string(),
                unit,
                samples: Arc::clone(&self.samples),
            }))
        }

        fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn publish_sets_gauges_labelled_by_unit() {
        let recorder = CapturingRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            publish(&[
                ResilienceMetric::count("bulkhead.accepted", 4),
                ResilienceMetric::millis("latency_injector.total_delay", 250),
            ]);
        });

        let samples = recorder.samples.lock().clone();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].0, "bulkhead.accepted");
        assert_eq!(samples[0].1, MetricUnit::Count.as_str());
        assert!((samples[0].2 - 4.0).abs() < f64::EPSILON);
        assert_eq!(samples[1].1, MetricUnit::Milliseconds.as_str());
    }

    #[test]
    fn publish_without_recorder_is_noop() {
        publish(&[ResilienceMetric::count("test.samples", 3)]);
    }

    #[test]
    fn publish_all_counts_samples() {
        let breaker = CircuitBreaker::new("db");
        let bulkhead = Bulkhead::new("db");
        let published = publish_all(&[&breaker, &bulkhead]);
        assert_eq!(published, breaker.metrics().len() + bulkhead.metrics().len());
    }
}
