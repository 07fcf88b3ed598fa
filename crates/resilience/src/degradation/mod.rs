//! Degradation control: stepwise service levels, fallback tiers and quality shedding

mod controller;
mod fallback;
mod quality;

pub use controller::{DegradationController, DegradationControllerConfig};
pub use fallback::{FallbackEngine, FallbackEngineConfig};
pub use quality::{QualityGovernor, QualityGovernorConfig};
