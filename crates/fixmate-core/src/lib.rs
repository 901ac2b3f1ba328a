//! # fixmate-core — Foundational Types for the Escrow Core
//!
//! Shared primitives used by every other crate in the workspace. This crate
//! depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `Uid`, `JobId`, `PaymentId`,
//!    `TransferId`, `CaseId` and friends are distinct types. A transfer id
//!    cannot be passed where a payment id is expected.
//!
//! 2. **Decimal money, integer minor units at the edge.** [`Money`] wraps
//!    `rust_decimal::Decimal` in major currency units. The payment processor
//!    only ever sees `i64` minor units produced by [`Money::to_minor_units`].
//!
//! 3. **Injected time.** Every deadline decision reads a [`Clock`]. Production
//!    uses [`SystemClock`]; tests drive a [`ManualClock`].
//!
//! 4. **Stable error kinds.** [`ErrorKind`] is the machine-readable taxonomy
//!    surfaced to callers. Crates map their own error enums onto it.
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod money;
pub mod temporal;

pub use error::{ErrorKind, MoneyError};
pub use identity::{
    CaseId, ChargeId, ConnectedAccountId, JobId, PaymentId, RefundId, TransferId, Uid,
};
pub use money::Money;
pub use temporal::{Clock, ManualClock, SystemClock, Timestamp};
