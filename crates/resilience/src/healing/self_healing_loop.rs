//! Fixed-interval self-correction task

use std::{
    fmt::Display,
    future::Future,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use application::MetricsSource;
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use futures::FutureExt;
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::config::default_true;

/// Configuration for a [`SelfHealingLoop`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfHealingLoopConfig {
    /// Period between correction cycles, in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Corrections credited per cycle at most
    #[serde(default = "default_max_corrections_per_cycle")]
    pub max_corrections_per_cycle: u32,

    /// Master switch; a disabled loop never starts
    #[serde(default = "default_true")]
    pub enabled: bool,
}

const fn default_interval_ms() -> u64 {
    10_000
}

const fn default_max_corrections_per_cycle() -> u32 {
    5
}

impl Default for SelfHealingLoopConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_corrections_per_cycle: default_max_corrections_per_cycle(),
            enabled: true,
        }
    }
}

#[derive(Debug, Default)]
struct LoopCounters {
    cycles: AtomicU64,
    corrections: AtomicU64,
    failures: AtomicU64,
}

/// Runs a correction callback on a fixed interval in a background task
///
/// The first cycle runs one interval after [`SelfHealingLoop::start`].
#[derive(Debug)]
pub struct SelfHealingLoop {
    config: SelfHealingLoopConfig,
    counters: Arc<LoopCounters>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SelfHealingLoop {
    #[must_use]
    pub fn new(config: SelfHealingLoopConfig) -> Self {
        Self {
            config,
            counters: Arc::new(LoopCounters::default()),
            task: Mutex::new(None),
        }
    }

    /// Spawns the loop on the current tokio runtime
    ///
    /// `check_and_correct` returns how many corrections it made; an `Err` or a
    /// panic is counted as a failure and the loop keeps going. Returns `false` when the
    /// loop is disabled, already running, or no runtime is available.
    pub fn start<F, Fut, E>(&self, check_and_correct: F) -> bool
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<u32, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        if !self.config.enabled {
            return false;
        }
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }
        let Ok(handle) = Handle::try_current() else {
            warn!("Self-healing loop needs a tokio runtime");
            return false;
        };

        let period = Duration::from_millis(self.config.interval_ms.max(1));
        let max_corrections = self.config.max_corrections_per_cycle;
        let counters = Arc::clone(&self.counters);
        *task = Some(handle.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                counters.cycles.fetch_add(1, Ordering::Relaxed);
                let started = panic::catch_unwind(AssertUnwindSafe(&check_and_correct));
                let outcome = match started {
                    Ok(correction) => AssertUnwindSafe(correction).catch_unwind().await,
                    Err(panicked) => Err(panicked),
                };
                match outcome {
                    Ok(Ok(n)) => {
                        let credited = n.min(max_corrections);
                        counters
                            .corrections
                            .fetch_add(u64::from(credited), Ordering::Relaxed);
                        debug!(corrections = credited, "Self-healing cycle");
                    },
                    Ok(Err(e)) => {
                        counters.failures.fetch_add(1, Ordering::Relaxed);
                        warn!(error = %e, "Self-healing correction failed");
                    },
                    Err(_) => {
                        counters.failures.fetch_add(1, Ordering::Relaxed);
                        warn!("Self-healing correction panicked");
                    },
                }
            }
        }));
        info!(interval_ms = self.config.interval_ms, "Self-healing loop started");
        true
    }

    /// Stops the background task
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            info!("Self-healing loop stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Default for SelfHealingLoop {
    fn default() -> Self {
        Self::new(SelfHealingLoopConfig::default())
    }
}

impl Drop for SelfHealingLoop {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

impl MetricsSource for SelfHealingLoop {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        vec![
            ResilienceMetric::count(
                "self_healing_loop.cycles",
                self.counters.cycles.load(Ordering::Relaxed),
            ),
            ResilienceMetric::count(
                "self_healing_loop.corrections",
                self.counters.corrections.load(Ordering::Relaxed),
            ),
            ResilienceMetric::count(
                "self_healing_loop.failures",
                self.counters.failures.load(Ordering::Relaxed),
            ),
        ]
    }
}
