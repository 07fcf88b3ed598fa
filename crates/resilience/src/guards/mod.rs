//! Resource guards: admission control against tracked load
//!
//! Every guard implements [`application::AdmissionGuard`]. A guard that is
//! disabled, or whose limit is zero, admits everything. The rate guards
//! ([`CpuGuard`], [`IoGuard`], [`QuotaController`]) reset their counters at
//! the start of each fixed window measured on the guard's clock.

mod cpu;
mod io;
mod memory;
mod quota;
mod resource;

pub use cpu::{CpuGuard, CpuGuardConfig};
pub use io::{IoGuard, IoGuardConfig};
pub use memory::{MemoryGuard, MemoryGuardConfig};
pub use quota::{QuotaController, QuotaControllerConfig};
pub use resource::{ResourceGuard, ResourceGuardConfig};

/// Fixed window bookkeeping shared by the rate guards
#[derive(Debug, Default)]
pub(crate) struct Window {
    start_ms: u64,
    used: u64,
}

impl Window {
    pub(crate) const fn starting_at(start_ms: u64) -> Self {
        Self { start_ms, used: 0 }
    }

    /// Starts a new window if `now_ms` is past the current one
    pub(crate) fn roll(&mut self, now_ms: u64, window_ms: u64) {
        if now_ms.saturating_sub(self.start_ms) >= window_ms {
            self.start_ms = now_ms;
            self.used = 0;
        }
    }

    /// Usage as seen at `now_ms`, without rolling
    pub(crate) const fn used_at(&self, now_ms: u64, window_ms: u64) -> u64 {
        if now_ms.saturating_sub(self.start_ms) >= window_ms {
            0
        } else {
            self.used
        }
    }
}
