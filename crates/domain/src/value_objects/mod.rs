//! Value Objects - Immutable, identity-less domain primitives

mod chaos_action;
mod chaos_fault;
mod circuit_state;
mod fallback_tier;
mod metric;
mod probability;

pub use chaos_action::{ChaosAction, ChaosActionKind, DEFAULT_DELAY_MS};
pub use chaos_fault::ChaosFaultType;
pub use circuit_state::CircuitState;
pub use fallback_tier::FallbackTier;
pub use metric::{MetricUnit, ResilienceMetric};
pub use probability::Probability;
