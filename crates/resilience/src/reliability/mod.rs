//! Request reliability: duplicate suppression and consistency-check budget

mod consistency;
mod idempotency;

pub use consistency::{ConsistencyGuard, ConsistencyGuardConfig};
pub use idempotency::{IdempotencyGuard, IdempotencyGuardConfig};
