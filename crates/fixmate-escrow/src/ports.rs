//! # Ports
//!
//! Narrow interfaces to the collaborators the engines depend on. Adapters
//! live elsewhere: the HTTP processor client in `fixmate-gateway`, the
//! Postgres ledger in `fixmate-api`, and the in-memory ledger in
//! [`crate::memory`].
//!
//! ## Ledger atomicity
//!
//! Multi-field state transitions go through [`LedgerStore::commit`]. Each
//! [`LedgerTransaction`] step re-reads its record inside the store's
//! transaction scope and applies a validating mutation. If any step fails,
//! nothing is written.

use std::collections::BTreeMap;

use async_trait::async_trait;
use fixmate_core::{
    CaseId, ChargeId, ConnectedAccountId, JobId, PaymentId, RefundId, Timestamp, TransferId, Uid,
};
use serde::{Deserialize, Serialize};

use crate::caller::Caller;
use crate::dispute::{Dispute, DisputeStatus};
use crate::error::{EscrowError, GatewayError, LedgerError, SignatureError, SinkError};
use crate::job::{Job, JobPatch};
use crate::payment::{ConnectedAccount, Payment, Refund, Transfer};

// ── Ledger Store ───────────────────────────────────────────────────────

pub type PaymentMutation = Box<dyn FnOnce(&mut Payment) -> Result<(), EscrowError> + Send>;
pub type DisputeMutation = Box<dyn FnOnce(&mut Dispute) -> Result<(), EscrowError> + Send>;
pub type TransferMutation = Box<dyn FnOnce(&mut Transfer) -> Result<(), EscrowError> + Send>;

/// One step of an atomic ledger write.
pub enum LedgerOp {
    UpdatePayment { id: PaymentId, mutate: PaymentMutation },
    UpdateDispute { id: CaseId, mutate: DisputeMutation },
    UpdateTransfer { id: TransferId, mutate: TransferMutation },
    PutTransfer(Transfer),
    PutRefund(Refund),
}

impl std::fmt::Debug for LedgerOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpdatePayment { id, .. } => write!(f, "UpdatePayment({id})"),
            Self::UpdateDispute { id, .. } => write!(f, "UpdateDispute({id})"),
            Self::UpdateTransfer { id, .. } => write!(f, "UpdateTransfer({id})"),
            Self::PutTransfer(t) => write!(f, "PutTransfer({})", t.id),
            Self::PutRefund(r) => write!(f, "PutRefund({})", r.id),
        }
    }
}

/// An ordered, all-or-nothing batch of ledger writes.
#[derive(Debug, Default)]
pub struct LedgerTransaction {
    ops: Vec<LedgerOp>,
}

impl LedgerTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_payment(
        mut self,
        id: PaymentId,
        mutate: impl FnOnce(&mut Payment) -> Result<(), EscrowError> + Send + 'static,
    ) -> Self {
        self.ops.push(LedgerOp::UpdatePayment {
            id,
            mutate: Box::new(mutate),
        });
        self
    }

    pub fn update_dispute(
        mut self,
        id: CaseId,
        mutate: impl FnOnce(&mut Dispute) -> Result<(), EscrowError> + Send + 'static,
    ) -> Self {
        self.ops.push(LedgerOp::UpdateDispute {
            id,
            mutate: Box::new(mutate),
        });
        self
    }

    pub fn update_transfer(
        mut self,
        id: TransferId,
        mutate: impl FnOnce(&mut Transfer) -> Result<(), EscrowError> + Send + 'static,
    ) -> Self {
        self.ops.push(LedgerOp::UpdateTransfer {
            id,
            mutate: Box::new(mutate),
        });
        self
    }

    pub fn put_transfer(mut self, transfer: Transfer) -> Self {
        self.ops.push(LedgerOp::PutTransfer(transfer));
        self
    }

    pub fn put_refund(mut self, refund: Refund) -> Self {
        self.ops.push(LedgerOp::PutRefund(refund));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<LedgerOp> {
        self.ops
    }
}

/// Result of an exclusive dispute insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisputeInsert {
    Inserted,
    /// Another dispute on the job is still active.
    Conflict(CaseId),
}

/// Document store holding payments, transfers, refunds, disputes, jobs and
/// connected accounts.
#[async_trait]
pub trait LedgerStore: Send + Sync + std::fmt::Debug {
    async fn get_payment(&self, id: &PaymentId) -> Result<Option<Payment>, LedgerError>;

    /// Insert a new payment. Returns `false` if the id already exists
    /// (the existing record is kept).
    async fn insert_payment(&self, payment: Payment) -> Result<bool, LedgerError>;

    async fn find_payment_by_charge(&self, charge: &ChargeId)
        -> Result<Option<Payment>, LedgerError>;

    /// Captured payments whose escrow hold ended at or before `now`.
    async fn list_releasable(&self, now: Timestamp) -> Result<Vec<Payment>, LedgerError>;

    async fn get_transfer(&self, id: &TransferId) -> Result<Option<Transfer>, LedgerError>;

    async fn list_refunds(&self, payment: &PaymentId) -> Result<Vec<Refund>, LedgerError>;

    async fn get_dispute(&self, id: &CaseId) -> Result<Option<Dispute>, LedgerError>;

    async fn active_dispute_for_job(&self, job: &JobId) -> Result<Option<Dispute>, LedgerError>;

    /// Insert a dispute unless the job already has an active one. The check
    /// and the insert are a single atomic step.
    async fn insert_dispute_exclusive(&self, dispute: Dispute)
        -> Result<DisputeInsert, LedgerError>;

    async fn list_disputes_by_status(
        &self,
        statuses: &[DisputeStatus],
    ) -> Result<Vec<Dispute>, LedgerError>;

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, LedgerError>;

    /// Merge the named fields into the job. Returns `false` if the job
    /// does not exist.
    async fn patch_job(&self, id: &JobId, patch: JobPatch) -> Result<bool, LedgerError>;

    async fn get_connected_account(
        &self,
        id: &ConnectedAccountId,
    ) -> Result<Option<ConnectedAccount>, LedgerError>;

    async fn upsert_connected_account(&self, account: ConnectedAccount)
        -> Result<(), LedgerError>;

    /// Apply every step or none. Missing records surface as the matching
    /// `*NotFound` error; mutation errors are returned as-is.
    async fn commit(&self, tx: LedgerTransaction) -> Result<(), EscrowError>;
}

// ── Payment Gateway ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub job_id: JobId,
    pub customer_uid: Uid,
    pub connected_account_id: Option<ConnectedAccountId>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedIntent {
    pub id: PaymentId,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub destination: ConnectedAccountId,
    pub source_charge: Option<ChargeId>,
    pub payment_id: PaymentId,
    pub job_id: JobId,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedTransfer {
    pub id: TransferId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundRequest {
    pub payment_id: PaymentId,
    pub amount_minor: i64,
    pub reason: Option<String>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedRefund {
    pub id: RefundId,
}

/// Third-party payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync + std::fmt::Debug {
    async fn create_payment_intent(&self, req: IntentRequest)
        -> Result<CreatedIntent, GatewayError>;

    async fn create_transfer(&self, req: TransferRequest) -> Result<CreatedTransfer, GatewayError>;

    async fn create_refund(&self, req: RefundRequest) -> Result<CreatedRefund, GatewayError>;

    /// Check a webhook delivery's signature header against its raw body.
    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: Timestamp,
    ) -> Result<(), SignatureError>;

    /// Decode a verified webhook body into a typed event.
    fn parse_event(&self, payload: &[u8]) -> Result<crate::events::ProcessorEvent, EscrowError>;
}

// ── Sinks ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub recipient: Uid,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsEvent {
    pub name: &'static str,
    pub uid: Option<Uid>,
    pub role: Option<&'static str>,
    pub props: serde_json::Value,
}

/// Push notification delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync + std::fmt::Debug {
    async fn send_push_notification(&self, notification: Notification) -> Result<(), SinkError>;
}

/// Server-side analytics.
#[async_trait]
pub trait AnalyticsSink: Send + Sync + std::fmt::Debug {
    async fn log_server_event(&self, event: AnalyticsEvent) -> Result<(), SinkError>;
}

// ── Admin Authorization ────────────────────────────────────────────────

/// Decides whether a caller holds admin rights.
#[async_trait]
pub trait AdminAuthorizer: Send + Sync + std::fmt::Debug {
    async fn is_admin(&self, caller: &Caller) -> Result<bool, EscrowError>;
}

/// Trusts the admin claim on the caller's verified credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimAdminAuthorizer;

#[async_trait]
impl AdminAuthorizer for ClaimAdminAuthorizer {
    async fn is_admin(&self, caller: &Caller) -> Result<bool, EscrowError> {
        Ok(caller.admin_claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_builder_keeps_order() {
        let tx = LedgerTransaction::new()
            .update_payment(PaymentId::new("pi_1"), |_| Ok(()))
            .update_dispute(CaseId::new(), |_| Ok(()));
        let ops = tx.into_ops();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], LedgerOp::UpdatePayment { .. }));
        assert!(format!("{:?}", ops[0]).contains("pi_1"));
    }

    #[tokio::test]
    async fn claim_authorizer_reads_claim() {
        let auth = ClaimAdminAuthorizer;
        assert!(auth.is_admin(&Caller::admin("a")).await.unwrap());
        assert!(!auth.is_admin(&Caller::user("u")).await.unwrap());
    }
}
