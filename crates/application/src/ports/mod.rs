//! Port definitions for the application layer
//!
//! Ports are the seams between the resilience primitives and their
//! collaborators. Adapters in the resilience crate implement these ports.

mod admission_guard;
mod clock;
mod engine_port;
mod metrics_source;

pub use admission_guard::AdmissionGuard;
pub use clock::Clock;
#[cfg(test)]
pub use engine_port::MockEnginePort;
pub use engine_port::{EngineInput, EngineKind, EngineOutput, EnginePort};
pub use metrics_source::MetricsSource;
