//! Domain layer for the resilience control plane
//!
//! Contains the value objects and entities shared by every resilience
//! primitive: metric samples, circuit and fallback states, chaos actions,
//! checkpoints and failover targets. This layer performs no I/O and has no
//! notion of time beyond the timestamps it is handed.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
