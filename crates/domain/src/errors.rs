//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Probability outside of `[0, 1]` or not a number
    #[error("Invalid probability: {0} (expected a value in [0, 1])")]
    InvalidProbability(f64),

    /// A textual enum value that does not name any variant
    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: String, value: String },

    /// Validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl DomainError {
    /// Create an unknown variant error
    pub fn unknown_variant(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_variant_creates_correct_error() {
        let err = DomainError::unknown_variant("fallback tier", "tertiary");
        match err {
            DomainError::UnknownVariant { kind, value } => {
                assert_eq!(kind, "fallback tier");
                assert_eq!(value, "tertiary");
            },
            _ => unreachable!("Expected UnknownVariant error"),
        }
    }

    #[test]
    fn unknown_variant_error_message_is_correct() {
        let err = DomainError::unknown_variant("chaos fault", "meteor");
        assert_eq!(err.to_string(), "Unknown chaos fault: meteor");
    }

    #[test]
    fn invalid_probability_error_message() {
        let err = DomainError::InvalidProbability(1.5);
        assert_eq!(
            err.to_string(),
            "Invalid probability: 1.5 (expected a value in [0, 1])"
        );
    }

    #[test]
    fn validation_error_message() {
        let err = DomainError::ValidationError("levels must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Validation failed: levels must be positive"
        );
    }
}
