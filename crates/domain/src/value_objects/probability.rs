//! Probability value object

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::DomainError;

/// A probability in the closed interval `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Probability(f64);

impl Probability {
    /// Never fires
    pub const NEVER: Self = Self(0.0);
    /// Always fires
    pub const ALWAYS: Self = Self(1.0);

    /// Create a validated probability
    pub fn new(value: f64) -> Result<Self, DomainError> {
        if value.is_nan() || !(0.0..=1.0).contains(&value) {
            return Err(DomainError::InvalidProbability(value));
        }
        Ok(Self(value))
    }

    /// Create a probability by clamping into `[0, 1]`; NaN becomes zero
    #[must_use]
    pub fn saturating(value: f64) -> Self {
        if value.is_nan() {
            return Self::NEVER;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// The raw value
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Whether a uniform roll in `[0, 1)` satisfies this probability
    #[must_use]
    pub fn admits(self, roll: f64) -> bool {
        roll < self.0
    }
}

impl Default for Probability {
    fn default() -> Self {
        Self::NEVER
    }
}

impl TryFrom<f64> for Probability {
    type Error = DomainError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Probability> for f64 {
    fn from(p: Probability) -> Self {
        p.0
    }
}

impl fmt::Display for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bounds() {
        assert!(Probability::new(0.0).is_ok());
        assert!(Probability::new(1.0).is_ok());
        assert!(Probability::new(0.25).is_ok());
    }

    #[test]
    fn rejects_out_of_range_and_nan() {
        assert!(Probability::new(-0.1).is_err());
        assert!(Probability::new(1.01).is_err());
        assert!(Probability::new(f64::NAN).is_err());
    }

    #[test]
    fn saturating_clamps() {
        assert!((Probability::saturating(3.0).value() - 1.0).abs() < f64::EPSILON);
        assert!(Probability::saturating(-2.0).value().abs() < f64::EPSILON);
        assert!(Probability::saturating(f64::NAN).value().abs() < f64::EPSILON);
    }

    #[test]
    fn admits_is_strict() {
        let p = Probability::new(0.5).unwrap();
        assert!(p.admits(0.49));
        assert!(!p.admits(0.5));
        assert!(!Probability::NEVER.admits(0.0));
        assert!(Probability::ALWAYS.admits(0.999_999));
    }

    #[test]
    fn deserialization_validates() {
        let ok: Result<Probability, _> = serde_json::from_str("0.3");
        assert!(ok.is_ok());
        let bad: Result<Probability, _> = serde_json::from_str("4.0");
        assert!(bad.is_err());
    }
}
