//! Domain entities - Records with identity owned by a single primitive

mod checkpoint;
mod failover_target;

pub use checkpoint::{RecoveryCheckpoint, ReplayEvent, StateSnapshot};
pub use failover_target::FailoverTarget;
