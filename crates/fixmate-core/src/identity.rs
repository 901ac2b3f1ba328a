//! # Identifier Newtypes
//!
//! Distinct types for every identifier namespace in the escrow core.
//!
//! Most identifiers are opaque strings assigned elsewhere: user ids come from
//! the identity provider, job ids from the document store, and payment,
//! charge, transfer, refund, and connected-account ids from the payment
//! processor. Dispute case ids are the only ones minted locally, as UUIDs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an externally assigned identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is empty (never valid as a reference).
            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Authenticated user id (customer, pro, or admin).
    Uid
);
string_id!(
    /// Job document id.
    JobId
);
string_id!(
    /// Processor payment-intent id. Doubles as the Payment record key.
    PaymentId
);
string_id!(
    /// Processor charge id, recorded on capture.
    ChargeId
);
string_id!(
    /// Processor transfer id.
    TransferId
);
string_id!(
    /// Processor refund id.
    RefundId
);
string_id!(
    /// Provider's connected account on the payment processor.
    ConnectedAccountId
);

/// Dispute case identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(Uuid);

impl CaseId {
    /// Generate a new random case identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CaseId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
