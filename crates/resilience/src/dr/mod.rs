//! Disaster recovery: failover routing, snapshot catalog and restore budget

mod failover;
mod restore;
mod snapshot;

pub use failover::{FailoverManager, FailoverManagerConfig};
pub use restore::{RestoreEngine, RestoreEngineConfig};
pub use snapshot::{SnapshotEngine, SnapshotEngineConfig, SnapshotRecord};
