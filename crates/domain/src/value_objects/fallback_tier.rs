//! Fallback tier value object

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DomainError;

/// Service tier, ordered from full service to bare minimum
///
/// The derived ordering follows declaration order, so
/// `Primary < Secondary < Degraded < Minimal`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FallbackTier {
    /// Full service
    #[default]
    Primary,
    /// First fallback
    Secondary,
    /// Reduced functionality
    Degraded,
    /// Bare minimum response
    Minimal,
}

impl FallbackTier {
    /// All tiers from best to worst
    pub const ALL: [Self; 4] = [Self::Primary, Self::Secondary, Self::Degraded, Self::Minimal];

    /// Position of the tier (primary 0 .. minimal 3)
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
            Self::Degraded => 2,
            Self::Minimal => 3,
        }
    }

    /// The next tier toward `Minimal`, if any
    #[must_use]
    pub const fn lower(self) -> Option<Self> {
        match self {
            Self::Primary => Some(Self::Secondary),
            Self::Secondary => Some(Self::Degraded),
            Self::Degraded => Some(Self::Minimal),
            Self::Minimal => None,
        }
    }

    /// The next tier toward `Primary`, if any
    #[must_use]
    pub const fn higher(self) -> Option<Self> {
        match self {
            Self::Primary => None,
            Self::Secondary => Some(Self::Primary),
            Self::Degraded => Some(Self::Secondary),
            Self::Minimal => Some(Self::Degraded),
        }
    }

    /// Lowercase name of the tier
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Degraded => "degraded",
            Self::Minimal => "minimal",
        }
    }
}

impl fmt::Display for FallbackTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FallbackTier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            "degraded" => Ok(Self::Degraded),
            "minimal" => Ok(Self::Minimal),
            _ => Err(DomainError::unknown_variant("fallback tier", s)),
        }
    }
}
