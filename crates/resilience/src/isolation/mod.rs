//! Isolation: keyed compartments and blast-radius containment

mod blast_radius;
mod pool;

pub use blast_radius::{BlastRadiusConfig, BlastRadiusController};
pub use pool::{IsolationPool, IsolationPoolConfig, compartment_hash};
