//! Error types for the access gate
//!
//! Every gate error is raised synchronously at the point of violation and is
//! never retryable: a violation is a programming or wiring defect, not a
//! transient condition.

use std::fmt;

/// Why a mutation was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationReason {
    /// No suppression scope was open
    NoSuppressionScope,
    /// The process is classified as production
    ProductionContext,
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuppressionScope => write!(f, "no suppression scope is open"),
            Self::ProductionContext => write!(f, "process is classified as production"),
        }
    }
}

/// Main gate error type
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Mutation of a read-only collection without authorization
    #[error("read-only violation in {operation}: {reason}")]
    ReadOnlyViolation {
        /// Description of the attempted mutation
        operation: String,
        /// Which gate refused it
        reason: ViolationReason,
    },

    /// A required argument was absent
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The facade could not hand out its backing collection
    #[error("collaborator access failure: {0}")]
    CollaboratorAccessFailure(String),

    /// Error raised by the backing collection itself
    #[error("collection error: {0}")]
    Collaborator(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl GateError {
    /// Create a read-only violation
    pub fn violation(operation: impl Into<String>, reason: ViolationReason) -> Self {
        Self::ReadOnlyViolation {
            operation: operation.into(),
            reason,
        }
    }

    /// Create an invalid-argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a collaborator-access failure
    pub fn collaborator_access(msg: impl Into<String>) -> Self {
        Self::CollaboratorAccessFailure(msg.into())
    }

    /// Wrap an error from the backing collection
    pub fn collaborator<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Collaborator(Box::new(source))
    }

    /// Check if error is retryable
    ///
    /// Gate errors never are; store errors are passed through unchanged and
    /// the caller decides for those.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Wiring defect between gate and collaborator; must not be caught
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CollaboratorAccessFailure(_))
    }

    /// Violation reason, if this is a read-only violation
    #[must_use]
    pub fn violation_reason(&self) -> Option<ViolationReason> {
        match self {
            Self::ReadOnlyViolation { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Result type alias for gate operations
pub type GateResult<T> = Result<T, GateError>;

/// Gate configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure
    #[error("invalid gate config: {0}")]
    Toml(#[from] toml::de::Error),
}
