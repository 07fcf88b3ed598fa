//! Chaos runner: applies an ordered action list before a target executes

use std::{future::Future, time::Duration};

use application::MetricsSource;
use domain::{ChaosAction, ChaosActionKind, ResilienceMetric};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::InjectedError;
use crate::rng::SeededRng;

/// Configuration for a [`ChaosRunner`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChaosRunnerConfig {
    /// Actions, evaluated in declaration order
    #[serde(default)]
    pub actions: Vec<ChaosAction>,

    /// Seed for the probability rolls; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Default)]
struct RunnerCounters {
    delays: u64,
    failures: u64,
    drops: u64,
    duplicates: u64,
    reorders: u64,
    passes: u64,
}

#[derive(Debug)]
struct RunnerState {
    rng: SeededRng,
    counters: RunnerCounters,
}

/// Wraps target execution with chaos actions
#[derive(Debug)]
pub struct ChaosRunner {
    config: ChaosRunnerConfig,
    state: Mutex<RunnerState>,
}

impl ChaosRunner {
    /// Creates a runner with the given configuration
    #[must_use]
    pub fn new(config: ChaosRunnerConfig) -> Self {
        let rng = SeededRng::new(config.seed);
        Self {
            config,
            state: Mutex::new(RunnerState {
                rng,
                counters: RunnerCounters::default(),
            }),
        }
    }

    /// Configured actions
    #[must_use]
    pub fn actions(&self) -> &[ChaosAction] {
        &self.config.actions
    }

    /// Picks the action that fires for `target`, if any
    ///
    /// Actions not matching `target` are skipped without a roll; the first
    /// matching action whose roll lands under its probability wins.
    pub fn next_action(&self, target: &str) -> Option<&ChaosAction> {
        let mut state = self.state.lock();
        self.config
            .actions
            .iter()
            .filter(|action| action.applies_to(target))
            .find(|action| action.probability.admits(state.rng.next_f64()))
    }

    /// Runs `f` for `target` under the first firing action
    ///
    /// Returns `Ok(None)` when the call was dropped. A `duplicate` action runs
    /// `f` twice and returns the first result.
    pub async fn run<F, Fut, T, E>(&self, target: &str, mut f: F) -> Result<Option<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<InjectedError>,
    {
        let kind = self.next_action(target).map(|a| (a.kind, a.delay_ms()));
        match kind {
            None => {
                self.state.lock().counters.passes += 1;
                f().await.map(Some)
            },
            Some((ChaosActionKind::Delay, ms)) => {
                self.state.lock().counters.delays += 1;
                debug!(target = %target, delay_ms = ms, "Chaos delay");
                tokio::time::sleep(Duration::from_millis(ms)).await;
                f().await.map(Some)
            },
            Some((ChaosActionKind::Fail, _)) => {
                self.state.lock().counters.failures += 1;
                debug!(target = %target, "Chaos failure");
                Err(InjectedError::Failure(format!("Chaos: injected failure for {target}")).into())
            },
            Some((ChaosActionKind::Drop, _)) => {
                self.state.lock().counters.drops += 1;
                debug!(target = %target, "Chaos drop");
                Ok(None)
            },
            Some((ChaosActionKind::Duplicate, _)) => {
                self.state.lock().counters.duplicates += 1;
                let first = f().await;
                let _ = f().await;
                first.map(Some)
            },
            Some((ChaosActionKind::Reorder, _)) => {
                self.state.lock().counters.reorders += 1;
                tokio::task::yield_now().await;
                f().await.map(Some)
            },
        }
    }

    /// Rolls every matching `drop` action until one fires
    pub fn should_drop(&self, target: &str) -> bool {
        self.rolls_kind(target, ChaosActionKind::Drop)
    }

    /// Rolls every matching `fail` action until one fires
    pub fn should_fail(&self, target: &str) -> bool {
        self.rolls_kind(target, ChaosActionKind::Fail)
    }

    fn rolls_kind(&self, target: &str, kind: ChaosActionKind) -> bool {
        let mut state = self.state.lock();
        self.config
            .actions
            .iter()
            .filter(|action| action.kind == kind && action.applies_to(target))
            .any(|action| action.probability.admits(state.rng.next_f64()))
    }
}

impl Default for ChaosRunner {
    fn default() -> Self {
        Self::new(ChaosRunnerConfig::default())
    }
}

impl MetricsSource for ChaosRunner {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        let c = &state.counters;
        vec![
            ResilienceMetric::count("chaos_runner.delays", c.delays),
            ResilienceMetric::count("chaos_runner.failures", c.failures),
            ResilienceMetric::count("chaos_runner.drops", c.drops),
            ResilienceMetric::count("chaos_runner.duplicates", c.duplicates),
            ResilienceMetric::count("chaos_runner.reorders", c.reorders),
            ResilienceMetric::count("chaos_runner.passes", c.passes),
        ]
    }
}
