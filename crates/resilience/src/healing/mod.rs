//! Self-healing: periodic correction, anomaly detection, remediation budget
//! and shutdown hooks
//!
//! Failures inside this module are counted, never propagated: a failing
//! correction callback or shutdown hook shows up as a `failures` metric.

mod anomaly;
mod remediation;
mod self_healing_loop;
mod shutdown;

pub use anomaly::{AnomalyDetector, AnomalyDetectorConfig};
pub use remediation::{RemediationAction, RemediationEngine, RemediationEngineConfig};
pub use self_healing_loop::{SelfHealingLoop, SelfHealingLoopConfig};
pub use shutdown::{ShutdownHooks, ShutdownReport};
