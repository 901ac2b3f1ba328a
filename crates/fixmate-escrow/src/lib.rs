//! # fixmate-escrow — Escrow Payments and Disputes
//!
//! The payment escrow and dispute state machines of the marketplace, with
//! every external system reached through a port.
//!
//! ## Modules
//!
//! - [`payment`] — Payment, Transfer, Refund and connected-account records.
//! - [`dispute`] — Dispute record, status machine, evidence and audit trail.
//! - [`job`] — The job fields the core reads, and partial-field patches.
//! - [`policy`] — Time windows, minimum charge, fee schedule.
//! - [`events`] — Typed processor webhook events.
//! - [`ports`] — Ledger store, payment gateway, sinks, admin authorizer.
//! - [`escrow_engine`] — Intent, capture, release, refund, webhooks, sweep.
//! - [`dispute_engine`] — Open, evidence, resolve, expiry and reminder sweeps.
//! - [`memory`] — In-memory ledger.
//! - `testing` — Scripted gateway and recording sink (`testing` feature).
//!
//! ## Invariants
//!
//! - The sum of Refund amounts for a payment never exceeds its gross amount.
//! - At most one dispute per job is `open` or `under_review`.
//! - A payment reaches `transferred` only from `captured`.
//! - Ledger writes that move money happen after the processor confirmed.

pub mod caller;
pub mod context;
pub mod dispute;
pub mod dispute_engine;
pub mod error;
pub mod escrow_engine;
pub mod events;
pub mod job;
pub mod memory;
pub mod payment;
pub mod policy;
pub mod ports;
pub mod sinks;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use caller::{Actor, Caller};
pub use context::Collaborators;
pub use dispute::{Decision, Dispute, DisputeStatus, PartyRole};
pub use dispute_engine::{DisputeEngine, OpenDisputeInput};
pub use error::{EscrowError, GatewayError, LedgerError, SignatureError, SinkError};
pub use escrow_engine::{CreateIntentInput, EscrowEngine};
pub use events::{ProcessorEvent, WebhookOutcome};
pub use job::{Job, JobPatch, JobStatus};
pub use memory::InMemoryLedger;
pub use payment::{Payment, PaymentStatus, Refund, Transfer, TransferStatus};
pub use policy::{EscrowPolicy, FeeBreakdown, FeePolicy};
pub use ports::{AdminAuthorizer, LedgerStore, PaymentGateway};
pub use sinks::SideEffects;
