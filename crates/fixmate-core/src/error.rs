//! # Error Kinds
//!
//! The stable, machine-readable error taxonomy shared by every operation of
//! the escrow core. Callers branch on the kind, never on message text.
//!
//! Each crate keeps its own `thiserror` enum with full diagnostic context and
//! exposes a `kind()` accessor mapping onto [`ErrorKind`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of an operation failure.
///
/// Serialized in kebab-case (`"failed-precondition"`), which is also the
/// `code` field of every HTTP error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// No caller identity.
    Unauthenticated,
    /// Identity present but not authorized for this resource or action.
    PermissionDenied,
    /// Malformed or out-of-range input.
    InvalidArgument,
    /// Referenced payment, dispute, or job is absent.
    NotFound,
    /// Entity exists but is in the wrong state for the requested transition.
    FailedPrecondition,
    /// A conflicting active entity already exists.
    AlreadyExists,
    /// A time-boxed window has elapsed.
    DeadlineExceeded,
    /// Gateway or store failure not attributable to caller input.
    Internal,
    /// A collaborator is temporarily unreachable.
    Unavailable,
}

impl ErrorKind {
    /// The canonical kebab-case code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::PermissionDenied => "permission-denied",
            Self::InvalidArgument => "invalid-argument",
            Self::NotFound => "not-found",
            Self::FailedPrecondition => "failed-precondition",
            Self::AlreadyExists => "already-exists",
            Self::DeadlineExceeded => "deadline-exceeded",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
        }
    }

    /// Whether the failure stems from infrastructure rather than caller input.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, Self::Internal | Self::Unavailable)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from monetary arithmetic and conversion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount does not fit in `i64` minor units.
    #[error("amount {0} overflows minor-unit representation")]
    Overflow(String),

    /// The input could not be parsed as a decimal amount.
    #[error("invalid monetary amount: \"{0}\"")]
    Invalid(String),
}

impl MoneyError {
    /// Money errors always stem from caller input.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}
