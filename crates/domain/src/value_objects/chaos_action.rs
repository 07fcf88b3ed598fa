//! Chaos action value object
//!
//! A [`ChaosAction`] describes one fault the chaos runner may apply before a
//! target executes. Actions are immutable and evaluated in declaration order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::Probability;
use crate::DomainError;

/// Default delay applied by a `delay` action without an `ms` parameter
pub const DEFAULT_DELAY_MS: u64 = 100;

/// Kind of chaos action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChaosActionKind {
    /// Sleep before executing
    Delay,
    /// Raise an injected failure instead of executing
    Fail,
    /// Skip execution silently
    Drop,
    /// Execute twice
    Duplicate,
    /// Yield to other tasks before executing
    Reorder,
}

impl ChaosActionKind {
    /// Lowercase name of the kind
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Delay => "delay",
            Self::Fail => "fail",
            Self::Drop => "drop",
            Self::Duplicate => "duplicate",
            Self::Reorder => "reorder",
        }
    }
}

impl fmt::Display for ChaosActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChaosActionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "delay" => Ok(Self::Delay),
            "fail" => Ok(Self::Fail),
            "drop" => Ok(Self::Drop),
            "duplicate" => Ok(Self::Duplicate),
            "reorder" => Ok(Self::Reorder),
            _ => Err(DomainError::unknown_variant("chaos action", s)),
        }
    }
}

/// A single chaos action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaosAction {
    /// What the action does
    #[serde(rename = "type")]
    pub kind: ChaosActionKind,

    /// Target the action applies to; `None` applies to every target
    #[serde(default)]
    pub target: Option<String>,

    /// Chance the action fires when its target matches
    pub probability: Probability,

    /// Free-form parameters (e.g. `ms` for `delay`)
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
}

impl ChaosAction {
    /// Create an untargeted action
    #[must_use]
    pub fn new(kind: ChaosActionKind, probability: Probability) -> Self {
        Self {
            kind,
            target: None,
            probability,
            params: BTreeMap::new(),
        }
    }

    /// Create a `delay` action with a fixed duration
    #[must_use]
    pub fn delay(probability: Probability, ms: u64) -> Self {
        Self::new(ChaosActionKind::Delay, probability).with_param("ms", ms)
    }

    /// Restrict the action to a single target
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Attach a parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Whether this action applies to `target`
    #[must_use]
    pub fn applies_to(&self, target: &str) -> bool {
        self.target.as_deref().is_none_or(|t| t == target)
    }

    /// Delay in milliseconds for `delay` actions
    #[must_use]
    pub fn delay_ms(&self) -> u64 {
        self.params
            .get("ms")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(DEFAULT_DELAY_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untargeted_action_applies_everywhere() {
        let action = ChaosAction::new(ChaosActionKind::Fail, Probability::ALWAYS);
        assert!(action.applies_to("orders"));
        assert!(action.applies_to("billing"));
    }

    #[test]
    fn targeted_action_applies_only_to_target() {
        let action =
            ChaosAction::new(ChaosActionKind::Drop, Probability::ALWAYS).with_target("orders");
        assert!(action.applies_to("orders"));
        assert!(!action.applies_to("billing"));
    }

    #[test]
    fn delay_reads_ms_param() {
        let action = ChaosAction::delay(Probability::ALWAYS, 25);
        assert_eq!(action.delay_ms(), 25);
    }

    #[test]
    fn delay_defaults_without_param() {
        let action = ChaosAction::new(ChaosActionKind::Delay, Probability::ALWAYS);
        assert_eq!(action.delay_ms(), DEFAULT_DELAY_MS);
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("DROP".parse::<ChaosActionKind>().unwrap(), ChaosActionKind::Drop);
        assert!("explode".parse::<ChaosActionKind>().is_err());
    }

    #[test]
    fn deserializes_from_type_field() {
        let json = r#"{"type":"delay","probability":0.5,"params":{"ms":40}}"#;
        let action: ChaosAction = serde_json::from_str(json).unwrap();
        assert_eq!(action.kind, ChaosActionKind::Delay);
        assert_eq!(action.delay_ms(), 40);
        assert!(action.target.is_none());
    }

    #[test]
    fn rejects_invalid_probability() {
        let json = r#"{"type":"fail","probability":2.0}"#;
        let parsed: Result<ChaosAction, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }
}
