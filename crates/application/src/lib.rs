//! Application layer - Ports and errors
//!
//! Defines the interfaces the resilience primitives are wired through:
//! time, metric reporting, admission control and the engine capability
//! that guarded operations implement.

pub mod error;
pub mod ports;

pub use error::ApplicationError;
pub use ports::*;
