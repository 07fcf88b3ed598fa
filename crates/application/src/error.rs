//! Application-level errors

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur in the application layer
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Engine execution failed
    #[error("Engine error: {0}")]
    Engine(String),

    /// External dependency error
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Operation exceeded its deadline
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Operation was not attempted because a guard denied admission
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ExternalService(_) | Self::Timeout(_)
        )
    }

    /// Whether the operation was never attempted
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(ApplicationError::RateLimited.is_retryable());
        assert!(ApplicationError::ExternalService("down".into()).is_retryable());
        assert!(ApplicationError::Timeout(100).is_retryable());
        assert!(!ApplicationError::Engine("bad input".into()).is_retryable());
        assert!(!ApplicationError::Rejected("circuit open".into()).is_retryable());
    }

    #[test]
    fn rejection_is_distinct_from_failure() {
        assert!(ApplicationError::Rejected("bulkhead full".into()).is_rejection());
        assert!(!ApplicationError::Engine("boom".into()).is_rejection());
    }

    #[test]
    fn domain_error_converts_transparently() {
        let err: ApplicationError = DomainError::InvalidProbability(2.0).into();
        assert_eq!(
            err.to_string(),
            "Invalid probability: 2 (expected a value in [0, 1])"
        );
    }

    #[test]
    fn timeout_message() {
        assert_eq!(
            ApplicationError::Timeout(250).to_string(),
            "Operation timed out after 250ms"
        );
    }
}
