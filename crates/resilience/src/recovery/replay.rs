//! Replay engine: events recorded for replay after a checkpoint

use std::{fmt, sync::Arc};

use application::{Clock, MetricsSource};
use domain::{RecoveryCheckpoint, ReplayEvent, ResilienceMetric};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::BoundedRing;
use crate::clock::system_clock;

/// Configuration for a [`ReplayEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayEngineConfig {
    /// Events kept before the oldest is evicted
    #[serde(default = "default_max_replay_steps")]
    pub max_replay_steps: usize,

    /// Time budget for one replay, in milliseconds
    #[serde(default = "default_replay_timeout_ms")]
    pub replay_timeout_ms: u64,
}

const fn default_max_replay_steps() -> usize {
    1_000
}

const fn default_replay_timeout_ms() -> u64 {
    60_000
}

impl Default for ReplayEngineConfig {
    fn default() -> Self {
        Self {
            max_replay_steps: default_max_replay_steps(),
            replay_timeout_ms: default_replay_timeout_ms(),
        }
    }
}

#[derive(Debug)]
struct ReplayState<P> {
    events: BoundedRing<ReplayEvent<P>>,
    replays: u64,
    steps_replayed: u64,
    failures: u64,
}

/// Bounded event log
pub struct ReplayEngine<P = serde_json::Value> {
    config: ReplayEngineConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<ReplayState<P>>,
}

impl<P> fmt::Debug for ReplayEngine<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P: Clone> ReplayEngine<P> {
    /// Creates an empty engine
    #[must_use]
    pub fn new(config: ReplayEngineConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Creates an empty engine reading time from `clock`
    #[must_use]
    pub fn with_clock(config: ReplayEngineConfig, clock: Arc<dyn Clock>) -> Self {
        let events = BoundedRing::new(config.max_replay_steps);
        Self {
            config,
            clock,
            state: Mutex::new(ReplayState {
                events,
                replays: 0,
                steps_replayed: 0,
                failures: 0,
            }),
        }
    }

    /// Appends an event stamped with the current time
    pub fn record_event(&self, id: impl Into<String>, payload: P) {
        let timestamp_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        let sequence = state.events.take_sequence();
        state.events.push(ReplayEvent {
            id: id.into(),
            sequence,
            timestamp_ms,
            payload,
        });
    }

    /// Suffix of events at or after the checkpoint, in insertion order
    ///
    /// Timestamps come from a monotonic clock, so the log is sorted and a
    /// binary search finds the first qualifying event.
    #[must_use]
    pub fn events_from_checkpoint<C>(
        &self,
        checkpoint: &RecoveryCheckpoint<C>,
    ) -> Vec<ReplayEvent<P>> {
        let state = self.state.lock();
        let events = state.events.as_deque();
        let start = events.partition_point(|e| !e.is_at_or_after(checkpoint));
        events.range(start..).cloned().collect()
    }

    /// Events currently retained
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.state.lock().events.len()
    }

    /// Counts a completed replay of `steps` events
    pub fn record_replay(&self, steps: usize) {
        let mut state = self.state.lock();
        state.replays += 1;
        state.steps_replayed = state.steps_replayed.saturating_add(steps as u64);
    }

    /// Counts a failed replay
    pub fn record_replay_failure(&self) {
        self.state.lock().failures += 1;
    }

    /// Configured replay time budget
    #[must_use]
    pub const fn replay_timeout_ms(&self) -> u64 {
        self.config.replay_timeout_ms
    }
}

impl<P: Clone> Default for ReplayEngine<P> {
    fn default() -> Self {
        Self::new(ReplayEngineConfig::default())
    }
}

impl<P> MetricsSource for ReplayEngine<P> {
    fn metrics(&self) -> Vec<ResilienceMetric> {
        let state = self.state.lock();
        vec![
            ResilienceMetric::count("replay_engine.events", state.events.len() as u64),
            ResilienceMetric::count("replay_engine.replays", state.replays),
            ResilienceMetric::count("replay_engine.steps_replayed", state.steps_replayed),
            ResilienceMetric::count("replay_engine.failures", state.failures),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn checkpoint_at(timestamp_ms: u64) -> RecoveryCheckpoint<()> {
        RecoveryCheckpoint {
            id: "cp".to_string(),
            sequence: 0,
            timestamp_ms,
            payload: (),
        }
    }

    fn engine(max: usize) -> (ReplayEngine<u32>, ManualClock) {
        let clock = ManualClock::new(0);
        let e = ReplayEngine::with_clock(
            ReplayEngineConfig {
                max_replay_steps: max,
                ..Default::default()
            },
            Arc::new(clock.clone()),
        );
        (e, clock)
    }

    #[test]
    fn returns_suffix_from_checkpoint_time() {
        let (e, clock) = engine(100);
        for i in 0..10 {
            e.record_event(format!("e-{i}"), i);
            clock.advance(10);
        }
        let events = e.events_from_checkpoint(&checkpoint_at(50));
        let payloads: Vec<u32> = events.iter().map(|ev| ev.payload).collect();
        assert_eq!(payloads, vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn includes_events_sharing_checkpoint_timestamp() {
        let (e, clock) = engine(100);
        e.record_event("before", 0);
        clock.advance(5);
        e.record_event("a", 1);
        e.record_event("b", 2);
        let events = e.events_from_checkpoint(&checkpoint_at(5));
        assert_eq!(events.len(), 2);
        assert!(events[0].sequence < events[1].sequence);
    }

    #[test]
    fn checkpoint_after_all_events_yields_nothing() {
        let (e, _) = engine(100);
        e.record_event("a", 1);
        assert!(e.events_from_checkpoint(&checkpoint_at(1_000)).is_empty());
    }

    #[test]
    fn oldest_events_evicted() {
        let (e, _) = engine(3);
        for i in 0..5 {
            e.record_event(format!("e-{i}"), i);
        }
        assert_eq!(e.event_count(), 3);
        let all = e.events_from_checkpoint(&checkpoint_at(0));
        assert_eq!(all[0].payload, 2);
    }

    #[test]
    fn replays_against_manager_built_earlier() {
        use std::{thread::sleep, time::Duration};

        use crate::recovery::{RecoveryManager, RecoveryManagerConfig};

        let manager = RecoveryManager::new(RecoveryManagerConfig::default());
        sleep(Duration::from_millis(60));
        let replay = ReplayEngine::new(ReplayEngineConfig::default());
        sleep(Duration::from_millis(20));

        replay.record_event("before", 0u32);
        sleep(Duration::from_millis(5));
        manager.create_checkpoint("cp", ());
        sleep(Duration::from_millis(5));
        replay.record_event("after", 1u32);

        let checkpoint = manager.latest_checkpoint().unwrap();
        let events = replay.events_from_checkpoint(&checkpoint);
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["after"]);
    }

    #[test]
    fn replay_counters() {
        let (e, _) = engine(10);
        e.record_replay(4);
        e.record_replay(6);
        e.record_replay_failure();
        let metrics = e.metrics();
        assert!((metrics[1].value - 2.0).abs() < f64::EPSILON);
        assert!((metrics[2].value - 10.0).abs() < f64::EPSILON);
        assert!((metrics[3].value - 1.0).abs() < f64::EPSILON);
    }
}
