//! # API Route Modules
//!
//! - `payments` — Payment intents, reads, escrow release, refunds.
//! - `disputes` — Dispute open, evidence, admin resolution, reads.
//! - `webhooks` — Signature-verified processor events (outside bearer auth).
//! - `sweeps` — On-demand runs of the scheduled sweeps (`system` role).

pub mod disputes;
pub mod payments;
pub mod sweeps;
pub mod webhooks;
