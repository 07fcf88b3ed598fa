//! Ordered async shutdown hooks
//!
//! Hooks run once, last registered first. A failing hook is logged and
//! counted; the remaining hooks still run.

use std::{
    fmt::{self, Display},
    future::Future,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

use application::MetricsSource;
use domain::ResilienceMetric;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

type Hook = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), String>> + Send>;

/// Outcome of [`ShutdownHooks::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    pub completed: usize,
    pub failed: usize,
}

/// Registry of shutdown hooks owned by one process component
#[derive(Default)]
pub struct ShutdownHooks {
    hooks: Mutex<Vec<(String, Hook)>>,
    shutting_down: AtomicBool,
    completed: AtomicU64,
    failures: AtomicU64,
}

impl fmt::Debug for ShutdownHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHooks")
            .field("pending", &self.hooks.lock().len())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

impl ShutdownHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named hook
    pub fn register<F, Fut, E>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display,
    {
        let hook: Hook = Box::new(move || {
            Box::pin(async move { hook().await.map_err(|e| e.to_string()) })
        });
        self.hooks.lock().push((name.into(), hook));
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Runs every hook in reverse registration order
    ///
    /// Only the first call does anything; later calls return an empty report.
    pub async fn run(&self) -> ShutdownReport {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return ShutdownReport::default();
        }
        let hooks = std::mem::take(&mut *self.hooks.lock());
        let mut report = ShutdownReport::default();
        for (name, hook) in hooks.into_iter().rev() {
            match hook().await {
                Ok(()) => {
                    report.completed += 1;
                    self.completed.fetch_add(1, Ordering::Relaxed);
                },
                Err(e) => {
                    report.failed += 1;
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(hook = %name, error = %e, "Shutdown hook failed");
                },
            }
        }
        info!(
            completed = report.completed,
            failed = report.failed,
            "Shutdown hooks finished"
        );
        report
    }
}

impl MetricsSource for ShutdownHooks {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        vec![
            ResilienceMetric::count("shutdown_hooks.pending", self.hooks.lock().len() as u64),
            ResilienceMetric::count(
                "shutdown_hooks.completed",
                self.completed.load(Ordering::Relaxed),
            ),
            ResilienceMetric::count("shutdown_hooks.failures", self.failures.load(Ordering::Relaxed)),
        ]
    }
}
