//! Admission guard port
//!
//! Shared shape of the resource guards: an admission check against a
//! tracked counter and a configured limit, and a way to give capacity back.

use crate::MetricsSource;

/// Admission control against a tracked resource
pub trait AdmissionGuard: MetricsSource + Send + Sync {
    /// Admit `cost` units if the guard has room, tracking them on success
    fn allow(&self, cost: u64) -> bool;

    /// Return `cost` previously admitted units
    fn release(&self, cost: u64);

    /// Short name used as metric prefix
    fn name(&self) -> &'static str;
}
