//! Circuit breaker state

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Normal operation, requests pass through
    #[default]
    Closed,
    /// Dependency is failing, requests fail fast
    Open,
    /// Probing whether the dependency has recovered
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used in metric output (closed 0, half-open 1, open 2)
    #[must_use]
    pub const fn metric_value(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::HalfOpen => 1,
            Self::Open => 2,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}
