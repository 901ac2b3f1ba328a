//! Caller identity as seen by the engines.

use fixmate_core::Uid;

use crate::error::EscrowError;

/// An authenticated end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub uid: Uid,
    /// Admin claim carried by the caller's credentials. Consulted by
    /// [`ClaimAdminAuthorizer`](crate::ports::ClaimAdminAuthorizer).
    pub admin_claim: bool,
}

impl Caller {
    pub fn user(uid: impl Into<Uid>) -> Self {
        Self {
            uid: uid.into(),
            admin_claim: false,
        }
    }

    pub fn admin(uid: impl Into<Uid>) -> Self {
        Self {
            uid: uid.into(),
            admin_claim: true,
        }
    }
}

/// Who is driving an escrow release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    User(Caller),
    /// Scheduled sweep.
    System,
}

impl Actor {
    pub fn caller(&self) -> Option<&Caller> {
        match self {
            Self::User(c) => Some(c),
            Self::System => None,
        }
    }

    /// Uid for logs and analytics.
    pub fn label(&self) -> &str {
        match self {
            Self::User(c) => c.uid.as_str(),
            Self::System => crate::dispute::SYSTEM_ACTOR,
        }
    }
}

/// Reject calls without an identity.
pub(crate) fn authenticated(caller: Option<&Caller>) -> Result<&Caller, EscrowError> {
    caller.ok_or(EscrowError::Unauthenticated)
}
