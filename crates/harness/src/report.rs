//! Scenario report - the serializable outcome of one harness run

use std::time::Duration;

use chrono::{DateTime, Utc};
use domain::ResilienceMetric;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metrics and timing of one scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name, e.g. `resilience`
    pub scenario: String,
    /// Unique id of this run
    pub run_id: Uuid,
    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,
    /// Elapsed time in milliseconds
    pub duration_ms: u64,
    /// Combined metrics of every component the scenario drove
    pub metrics: Vec<ResilienceMetric>,
}

impl ScenarioReport {
    /// Build a report with a fresh run id
    pub fn new(
        scenario: impl Into<String>,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        metrics: Vec<ResilienceMetric>,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            run_id: Uuid::new_v4(),
            started_at,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            metrics,
        }
    }

    /// Value of the first metric named `name`
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value)
    }

    /// Pretty-printed JSON
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
