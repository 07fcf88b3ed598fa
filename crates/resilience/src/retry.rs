//! Bounded retry with configurable backoff
//!
//! Each [`RetryEngine::execute`] call starts from attempt zero. An error is
//! retried only if its message contains one of the configured
//! `retryable_errors` substrings; an empty list makes every error retryable.
//!
//! # Example
//!
//! ```rust,ignore
//! use resilience::retry::{RetryConfig, RetryEngine};
//!
//! let engine = RetryEngine::new(RetryConfig::default());
//! let result = engine.execute(|| async { dependency.call().await }).await;
//! ```

use std::{fmt::Display, future::Future, time::Duration};

use application::MetricsSource;
use domain::ResilienceMetric;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{backoff::BackoffStrategy, rng::SeededRng};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds (default: 100ms)
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds (default: 5000ms)
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Growth factor for exponential strategies (default: 2.0)
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Delay growth strategy (default: exponential)
    #[serde(default)]
    pub strategy: BackoffStrategy,

    /// Jitter amplitude for the jitter strategy (default: 0.1)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,

    /// Error message substrings that mark an error retryable; empty means all
    #[serde(default)]
    pub retryable_errors: Vec<String>,

    /// Seed for jitter rolls; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_delay() -> u64 {
    100
}

const fn default_max_delay() -> u64 {
    5_000
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_jitter_factor() -> f64 {
    0.1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
            strategy: BackoffStrategy::default(),
            jitter_factor: default_jitter_factor(),
            retryable_errors: Vec::new(),
            seed: None,
        }
    }
}

impl RetryConfig {
    /// Configuration for fast retries of low latency operations
    #[must_use]
    pub fn fast() -> Self {
        Self {
            initial_delay_ms: 50,
            max_delay_ms: 1_000,
            ..Self::default()
        }
    }

    /// Configuration for slow or expensive operations
    #[must_use]
    pub fn slow() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            ..Self::default()
        }
    }

    /// Restricts retries to errors whose message contains one of `patterns`
    #[must_use]
    pub fn retry_on<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retryable_errors = patterns.into_iter().map(Into::into).collect();
        self
    }
}

/// Final result plus attempt metadata
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// The result of the last attempt
    pub result: Result<T, E>,
    /// Number of attempts made (1 = no retries)
    pub attempts: u32,
    /// Total time spent including delays
    pub total_duration: Duration,
}

impl<T, E> RetryResult<T, E> {
    /// Check if the operation succeeded
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Convert to standard Result, discarding metadata
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

#[derive(Debug)]
struct RetryState {
    attempts: u64,
    successes: u64,
    failures: u64,
    retries: u64,
    rng: SeededRng,
}

/// Bounded retry executor
#[derive(Debug)]
pub struct RetryEngine {
    config: RetryConfig,
    state: Mutex<RetryState>,
}

impl RetryEngine {
    /// Creates an engine with the given configuration
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        let rng = SeededRng::new(config.seed);
        Self {
            config,
            state: Mutex::new(RetryState {
                attempts: 0,
                successes: 0,
                failures: 0,
                retries: 0,
                rng,
            }),
        }
    }

    /// Returns the configuration
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Whether an error with this message may be retried
    #[must_use]
    pub fn is_retryable(&self, message: &str) -> bool {
        self.config.retryable_errors.is_empty()
            || self
                .config
                .retryable_errors
                .iter()
                .any(|pattern| message.contains(pattern.as_str()))
    }

    /// Delay before the retry following zero-based `attempt`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let roll = self.state.lock().rng.next_f64();
        Duration::from_millis(self.config.strategy.delay_ms(
            self.config.initial_delay_ms,
            self.config.multiplier,
            self.config.max_delay_ms,
            self.config.jitter_factor,
            attempt,
            roll,
        ))
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of attempts; returns the last error in the latter cases
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_detailed(operation).await.into_result()
    }

    /// Like [`execute`](Self::execute), with attempt metadata
    pub async fn execute_detailed<F, Fut, T, E>(&self, operation: F) -> RetryResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.execute_when(operation, |_| true).await
    }

    /// Like [`execute_detailed`](Self::execute_detailed), but an error is
    /// only retried when `retry_if` also accepts it
    #[allow(clippy::cast_possible_truncation)]
    pub async fn execute_when<F, Fut, T, E, P>(
        &self,
        mut operation: F,
        retry_if: P,
    ) -> RetryResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let start = Instant::now();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            self.state.lock().attempts += 1;
            match operation().await {
                Ok(value) => {
                    self.state.lock().successes += 1;
                    if attempt > 0 {
                        debug!(
                            attempts = attempt + 1,
                            duration_ms = start.elapsed().as_millis() as u64,
                            "Operation succeeded after retries"
                        );
                    }
                    return RetryResult {
                        result: Ok(value),
                        attempts: attempt + 1,
                        total_duration: start.elapsed(),
                    };
                },
                Err(err) => {
                    self.state.lock().failures += 1;
                    let message = err.to_string();
                    let exhausted = attempt + 1 >= max_attempts;

                    if exhausted || !retry_if(&err) || !self.is_retryable(&message) {
                        if exhausted {
                            warn!(
                                attempts = attempt + 1,
                                error = %message,
                                "Operation failed after max attempts"
                            );
                        } else {
                            debug!(
                                attempts = attempt + 1,
                                error = %message,
                                "Operation failed with non-retryable error"
                            );
                        }
                        return RetryResult {
                            result: Err(err),
                            attempts: attempt + 1,
                            total_duration: start.elapsed(),
                        };
                    }

                    self.state.lock().retries += 1;
                    let delay = self.delay_for_attempt(attempt);
                    debug!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
            }
        }
    }
}

impl Default for RetryEngine {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl MetricsSource for RetryEngine {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("retry_engine.attempts", state.attempts),
            ResilienceMetric::count("retry_engine.successes", state.successes),
            ResilienceMetric::count("retry_engine.failures", state.failures),
            ResilienceMetric::count("retry_engine.retries", state.retries),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    fn quick(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            ..RetryConfig::default()
        }
    }

    #[test]
    fn default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay_ms, 100);
        assert_eq!(config.max_delay_ms, 5_000);
        assert!((config.multiplier - 2.0).abs() < f64::EPSILON);
        assert!(config.retryable_errors.is_empty());
    }

    #[test]
    fn exponential_delay_is_capped() {
        let engine = RetryEngine::new(RetryConfig::default());
        assert_eq!(engine.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(engine.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(engine.delay_for_attempt(10), Duration::from_millis(5_000));
    }

    #[test]
    fn empty_allow_list_retries_everything() {
        let engine = RetryEngine::default();
        assert!(engine.is_retryable("anything at all"));
    }

    #[test]
    fn allow_list_matches_substrings() {
        let engine = RetryEngine::new(RetryConfig::default().retry_on(["ECONNRESET", "timeout"]));
        assert!(engine.is_retryable("read ECONNRESET from upstream"));
        assert!(engine.is_retryable("request timeout"));
        assert!(!engine.is_retryable("invalid input"));
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let engine = RetryEngine::new(quick(3));
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let result = engine
            .execute_detailed(|| {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(42)
                }
            })
            .await;

        assert_eq!(result.attempts, 1);
        assert_eq!(result.into_result().unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_retries() {
        let engine = RetryEngine::new(quick(3));
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let result = engine
            .execute_detailed(|| {
                let c = Arc::clone(&c);
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let engine = RetryEngine::new(quick(3));
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let result: Result<(), String> = engine
            .execute(|| {
                let c = Arc::clone(&c);
                async move {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    Err(format!("failure {n}"))
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let metrics = engine.metrics();
        let retries = metrics
            .iter()
            .find(|m| m.name == "retry_engine.retries")
            .unwrap();
        assert!((retries.value - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let engine = RetryEngine::new(quick(5).retry_on(["transient"]));
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let result: Result<(), String> = engine
            .execute(|| {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("permanent".to_string())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn predicate_can_veto_retry() {
        let engine = RetryEngine::new(quick(5));
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let result = engine
            .execute_when(
                || {
                    let c = Arc::clone(&c);
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>("fatal".to_string())
                    }
                },
                |err| err != "fatal",
            )
            .await;

        assert!(!result.is_ok());
        assert_eq!(result.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn each_execute_starts_fresh() {
        let engine = RetryEngine::new(quick(2));
        for _ in 0..3 {
            let calls = Arc::new(AtomicU32::new(0));
            let c = Arc::clone(&calls);
            let _: Result<(), String> = engine
                .execute(|| {
                    let c = Arc::clone(&c);
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Err("x".to_string())
                    }
                })
                .await;
            assert_eq!(calls.load(Ordering::SeqCst), 2);
        }
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let engine = RetryEngine::new(quick(0));
        let result: Result<u8, String> = engine.execute(|| async { Ok(1) }).await;
        assert_eq!(result.unwrap(), 1);
    }
}
