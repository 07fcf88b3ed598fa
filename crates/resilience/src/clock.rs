//! Clock adapters
//!
//! [`SystemClock`] reads a monotonic `Instant` anchored once per process, so
//! timestamps taken by different primitives are comparable.
//! [`ManualClock`] only moves when told to and is shared between clones,
//! which makes every time-window primitive testable without sleeping.

use std::{
    sync::{
        Arc, LazyLock,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use application::Clock;

static PROCESS_ORIGIN: LazyLock<Instant> = LazyLock::new(Instant::now);

static SYSTEM_CLOCK: LazyLock<Arc<dyn Clock>> = LazyLock::new(|| Arc::new(SystemClock::new()));

/// Monotonic wall clock
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock on the process-wide origin
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: *PROCESS_ORIGIN,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Manually advanced clock for deterministic tests and simulations
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `start_ms`
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Moves the clock forward
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Moves the clock to `ms`; never moves it backwards
    pub fn set(&self, ms: u64) {
        self.now.fetch_max(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Shared system clock handle, the default for every primitive
#[must_use]
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::clone(&SYSTEM_CLOCK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(10);
        assert_eq!(clock.now_ms(), 10);
        clock.advance(5);
        assert_eq!(clock.now_ms(), 15);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let a = ManualClock::new(0);
        let b = a.clone();
        a.advance(100);
        assert_eq!(b.now_ms(), 100);
    }

    #[test]
    fn manual_clock_never_goes_backwards() {
        let clock = ManualClock::new(50);
        clock.set(20);
        assert_eq!(clock.now_ms(), 50);
        clock.set(70);
        assert_eq!(clock.now_ms(), 70);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }

    #[test]
    fn system_clocks_share_one_origin() {
        let early = system_clock();
        std::thread::sleep(std::time::Duration::from_millis(30));
        let late = system_clock();
        let fresh = SystemClock::new();
        let (a, b, c) = (early.now_ms(), late.now_ms(), fresh.now_ms());
        assert!(a.abs_diff(b) < 5, "early={a} late={b}");
        assert!(a.abs_diff(c) < 5, "early={a} fresh={c}");
    }
}
