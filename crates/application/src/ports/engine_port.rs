//! Engine port - single capability interface for guarded engines
//!
//! Every business engine the resilience layer wraps is reduced to one
//! `execute(input) -> output` capability, tagged by its kind.

use std::fmt;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;

/// Which engine an implementation stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Trust scoring
    Trust,
    /// Intelligence / inference
    Intelligence,
    /// Optimization
    Optimization,
    /// Distributed coordination
    Distributed,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Trust => "trust",
            Self::Intelligence => "intelligence",
            Self::Optimization => "optimization",
            Self::Distributed => "distributed",
        };
        f.write_str(s)
    }
}

/// Opaque engine input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineInput {
    /// Target name, used for chaos targeting and compartment hashing
    pub target: String,
    /// Business payload, opaque to the resilience layer
    pub payload: serde_json::Value,
}

impl EngineInput {
    /// Create an input for a target
    pub fn new(target: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            target: target.into(),
            payload,
        }
    }
}

/// Opaque engine output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOutput {
    /// Business payload, opaque to the resilience layer
    pub payload: serde_json::Value,
}

impl EngineOutput {
    /// Wrap a payload
    pub const fn new(payload: serde_json::Value) -> Self {
        Self { payload }
    }
}

/// Port for engine execution
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EnginePort: Send + Sync {
    /// Execute one unit of work
    async fn execute(&self, input: EngineInput) -> Result<EngineOutput, ApplicationError>;

    /// Which engine this is
    fn kind(&self) -> EngineKind;
}
