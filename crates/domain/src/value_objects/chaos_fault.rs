//! Scenario-level chaos fault selector

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DomainError;

/// The single fault a chaos orchestrator currently simulates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChaosFaultType {
    /// No active fault
    #[default]
    None,
    /// Added latency
    Latency,
    /// Hard failures
    Failure,
    /// Lost packets, surfaced as latency
    PacketLoss,
    /// Memory pressure
    Memory,
    /// CPU pressure
    Cpu,
    /// Unavailable dependency
    Dependency,
}

impl ChaosFaultType {
    /// Snake-case name of the fault
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Latency => "latency",
            Self::Failure => "failure",
            Self::PacketLoss => "packet_loss",
            Self::Memory => "memory",
            Self::Cpu => "cpu",
            Self::Dependency => "dependency",
        }
    }

    /// Whether the fault forces every failure roll to hit
    #[must_use]
    pub const fn forces_failure(&self) -> bool {
        matches!(self, Self::Failure | Self::Dependency)
    }

    /// Whether the fault manifests as latency
    #[must_use]
    pub const fn adds_latency(&self) -> bool {
        matches!(self, Self::Latency | Self::PacketLoss)
    }
}

impl fmt::Display for ChaosFaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChaosFaultType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "none" => Ok(Self::None),
            "latency" => Ok(Self::Latency),
            "failure" => Ok(Self::Failure),
            "packet_loss" => Ok(Self::PacketLoss),
            "memory" => Ok(Self::Memory),
            "cpu" => Ok(Self::Cpu),
            "dependency" => Ok(Self::Dependency),
            _ => Err(DomainError::unknown_variant("chaos fault", s)),
        }
    }
}
