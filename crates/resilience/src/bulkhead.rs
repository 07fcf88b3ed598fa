//! Bulkhead: per-compartment concurrency limit with a bounded FIFO wait queue
//!
//! A caller that finds every slot taken waits in the queue until a
//! [`Bulkhead::release`] hands it a slot or its queue timeout fires. Waiters
//! are woken strictly in arrival order. Acquiring is cancel-safe: a caller
//! dropped while queued leaves the queue, and one dropped after a release
//! already granted it a slot gives that slot back.

use std::{collections::VecDeque, fmt, future::Future, time::Duration};

use application::MetricsSource;
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// Configuration for a bulkhead
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkheadConfig {
    /// Maximum concurrent grants
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,

    /// Maximum queued waiters
    #[serde(default = "default_max_queue")]
    pub max_queue: usize,

    /// How long a queued waiter waits for a slot, in milliseconds
    #[serde(default = "default_queue_timeout_ms")]
    pub queue_timeout_ms: u64,
}

const fn default_max_concurrency() -> u32 {
    10
}

const fn default_max_queue() -> usize {
    100
}

const fn default_queue_timeout_ms() -> u64 {
    5_000
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_queue: default_max_queue(),
            queue_timeout_ms: default_queue_timeout_ms(),
        }
    }
}

/// Result of [`Bulkhead::acquire`]
///
/// `Rejected` and `TimedOut` both mean "could not acquire"; they are kept
/// apart so callers can count them separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// A slot was granted and must be released
    Acquired,
    /// The queue was full
    Rejected,
    /// The caller queued but no slot freed up in time
    TimedOut,
}

impl AcquireOutcome {
    /// Whether a slot was granted
    #[must_use]
    pub const fn is_acquired(self) -> bool {
        matches!(self, Self::Acquired)
    }
}

/// Error returned by [`Bulkhead::run`] when no slot could be acquired
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BulkheadError {
    /// Queue was full
    #[error("Bulkhead full: queue limit reached")]
    Full,

    /// Waited in the queue past the timeout
    #[error("Bulkhead queue timeout")]
    TimedOut,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    tx: oneshot::Sender<()>,
}

#[derive(Debug, Default)]
struct BulkheadState {
    in_flight: u32,
    queue: VecDeque<Waiter>,
    next_waiter: u64,
    accepted: u64,
    rejected: u64,
    timed_out: u64,
}

/// Concurrency partition for one compartment
pub struct Bulkhead {
    name: String,
    config: BulkheadConfig,
    state: Mutex<BulkheadState>,
}

impl fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bulkhead")
            .field("name", &self.name)
            .field("in_flight", &self.in_flight())
            .field("queue_len", &self.queue_len())
            .finish_non_exhaustive()
    }
}

/// Queue entry of an in-progress acquire
///
/// A release pops the entry and sends the grant under the state lock, so
/// under that lock the entry is either still queued or its grant is
/// readable from `rx`.
struct PendingAcquire<'a> {
    bulkhead: &'a Bulkhead,
    id: u64,
    rx: oneshot::Receiver<()>,
    settled: bool,
}

impl PendingAcquire<'_> {
    /// Resolves a wait whose timer fired
    fn expire(&mut self) -> AcquireOutcome {
        self.settled = true;
        let mut state = self.bulkhead.state.lock();
        if let Some(pos) = state.queue.iter().position(|w| w.id == self.id) {
            state.queue.remove(pos);
            state.timed_out += 1;
            debug!(bulkhead = %self.bulkhead.name, "Bulkhead queue wait timed out");
            AcquireOutcome::TimedOut
        } else if self.rx.try_recv().is_ok() {
            AcquireOutcome::Acquired
        } else {
            AcquireOutcome::TimedOut
        }
    }
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let granted = {
            let mut state = self.bulkhead.state.lock();
            if let Some(pos) = state.queue.iter().position(|w| w.id == self.id) {
                state.queue.remove(pos);
                false
            } else {
                self.rx.try_recv().is_ok()
            }
        };
        if granted {
            debug!(bulkhead = %self.bulkhead.name, "Returning slot granted to abandoned waiter");
            self.bulkhead.release();
        }
    }
}

/// Slot held for the duration of [`Bulkhead::run`]; released on drop
struct Permit<'a>(&'a Bulkhead);

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.0.release();
    }
}

impl Bulkhead {
    /// Creates a bulkhead with default configuration
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, BulkheadConfig::default())
    }

    /// Creates a bulkhead with custom configuration
    #[must_use]
    pub fn with_config(name: impl Into<String>, config: BulkheadConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BulkheadState::default()),
        }
    }

    /// Returns the name of this bulkhead
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquires a slot, waiting in the queue if necessary
    pub async fn acquire(&self) -> AcquireOutcome {
        let (id, rx) = {
            let mut state = self.state.lock();
            if state.in_flight < self.config.max_concurrency {
                state.in_flight += 1;
                state.accepted += 1;
                return AcquireOutcome::Acquired;
            }
            if state.queue.len() >= self.config.max_queue {
                state.rejected += 1;
                debug!(bulkhead = %self.name, "Bulkhead full, rejecting caller");
                return AcquireOutcome::Rejected;
            }
            let (tx, rx) = oneshot::channel();
            let id = state.next_waiter;
            state.next_waiter += 1;
            state.queue.push_back(Waiter { id, tx });
            (id, rx)
        };
        let mut pending = PendingAcquire {
            bulkhead: self,
            id,
            rx,
            settled: false,
        };

        let timeout = Duration::from_millis(self.config.queue_timeout_ms);
        match tokio::time::timeout(timeout, &mut pending.rx).await {
            Ok(Ok(())) => {
                pending.settled = true;
                AcquireOutcome::Acquired
            },
            Ok(Err(_)) => {
                pending.settled = true;
                AcquireOutcome::Rejected
            },
            Err(_) => pending.expire(),
        }
    }

    /// Returns a slot and hands it to the oldest live waiter, if any
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        while state.in_flight < self.config.max_concurrency {
            let Some(waiter) = state.queue.pop_front() else {
                break;
            };
            if waiter.tx.send(()).is_ok() {
                state.in_flight += 1;
                state.accepted += 1;
                break;
            }
        }
    }

    /// Runs `f` inside a slot, releasing it afterwards
    pub async fn run<F, Fut, T>(&self, f: F) -> Result<T, BulkheadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        match self.acquire().await {
            AcquireOutcome::Acquired => {
                let _permit = Permit(self);
                Ok(f().await)
            },
            AcquireOutcome::Rejected => Err(BulkheadError::Full),
            AcquireOutcome::TimedOut => Err(BulkheadError::TimedOut),
        }
    }

    /// Current number of granted slots
    #[must_use]
    pub fn in_flight(&self) -> u32 {
        self.state.lock().in_flight
    }

    /// Current number of queued waiters
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }
}

impl MetricsSource for Bulkhead {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("bulkhead.in_flight", u64::from(state.in_flight)),
            ResilienceMetric::count("bulkhead.queue_length", state.queue.len() as u64),
            ResilienceMetric::count("bulkhead.accepted", state.accepted),
            ResilienceMetric::count("bulkhead.rejected", state.rejected),
            ResilienceMetric::count("bulkhead.timed_out", state.timed_out),
        ]
    }
}
