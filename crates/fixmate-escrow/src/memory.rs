//! # In-Memory Ledger
//!
//! A [`LedgerStore`] backed by process memory. Used when no database is
//! configured and by the test suites.
//!
//! All tables sit behind one `parking_lot::RwLock`, never held across an
//! `.await`. A commit stages copies of every touched record, runs each
//! mutation against the staged copy, and writes the batch back only if every
//! step succeeded.
//!
//! Jobs are kept as raw JSON documents so that [`JobPatch`] merges leave
//! fields owned by other subsystems untouched.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fixmate_core::{CaseId, ChargeId, ConnectedAccountId, JobId, PaymentId, Timestamp, TransferId};
use parking_lot::RwLock;

use crate::dispute::{Dispute, DisputeStatus};
use crate::error::{EscrowError, LedgerError};
use crate::job::{Job, JobPatch};
use crate::payment::{ConnectedAccount, Payment, PaymentStatus, Refund, Transfer};
use crate::ports::{DisputeInsert, LedgerOp, LedgerStore, LedgerTransaction};

#[derive(Debug, Default)]
struct Tables {
    payments: HashMap<PaymentId, Payment>,
    transfers: HashMap<TransferId, Transfer>,
    refunds: Vec<Refund>,
    disputes: HashMap<CaseId, Dispute>,
    jobs: HashMap<JobId, serde_json::Value>,
    accounts: HashMap<ConnectedAccountId, ConnectedAccount>,
}

#[derive(Default)]
struct Staged {
    payments: HashMap<PaymentId, Payment>,
    transfers: HashMap<TransferId, Transfer>,
    refunds: Vec<Refund>,
    disputes: HashMap<CaseId, Dispute>,
}

/// Thread-safe, cloneable in-memory ledger. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a job document, replacing any previous one.
    pub fn put_job(&self, job: &Job) -> Result<(), LedgerError> {
        let doc = serde_json::to_value(job).map_err(|e| LedgerError::Corrupt {
            key: format!("jobs/{}", job.id),
            message: e.to_string(),
        })?;
        self.tables.write().jobs.insert(job.id.clone(), doc);
        Ok(())
    }

    /// Store a raw job document, for fields the escrow core does not model.
    pub fn put_job_document(&self, id: JobId, doc: serde_json::Value) {
        self.tables.write().jobs.insert(id, doc);
    }

    pub fn job_document(&self, id: &JobId) -> Option<serde_json::Value> {
        self.tables.read().jobs.get(id).cloned()
    }

    /// Store a payment as-is, replacing any previous one.
    pub fn put_payment(&self, payment: Payment) {
        self.tables.write().payments.insert(payment.id.clone(), payment);
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.tables.read().transfers.values().cloned().collect()
    }

    pub fn disputes(&self) -> Vec<Dispute> {
        self.tables.read().disputes.values().cloned().collect()
    }

    fn commit_sync(&self, tx: LedgerTransaction) -> Result<(), EscrowError> {
        let mut tables = self.tables.write();
        let mut staged = Staged::default();

        for op in tx.into_ops() {
            match op {
                LedgerOp::UpdatePayment { id, mutate } => {
                    let mut record = match staged.payments.remove(&id) {
                        Some(p) => p,
                        None => tables
                            .payments
                            .get(&id)
                            .cloned()
                            .ok_or_else(|| EscrowError::PaymentNotFound(id.clone()))?,
                    };
                    mutate(&mut record)?;
                    staged.payments.insert(id, record);
                }
                LedgerOp::UpdateDispute { id, mutate } => {
                    let mut record = match staged.disputes.remove(&id) {
                        Some(d) => d,
                        None => tables
                            .disputes
                            .get(&id)
                            .cloned()
                            .ok_or(EscrowError::DisputeNotFound(id))?,
                    };
                    mutate(&mut record)?;
                    staged.disputes.insert(id, record);
                }
                LedgerOp::UpdateTransfer { id, mutate } => {
                    let mut record = match staged.transfers.remove(&id) {
                        Some(t) => t,
                        None => tables
                            .transfers
                            .get(&id)
                            .cloned()
                            .ok_or_else(|| EscrowError::TransferNotFound(id.clone()))?,
                    };
                    mutate(&mut record)?;
                    staged.transfers.insert(id, record);
                }
                LedgerOp::PutTransfer(transfer) => {
                    staged.transfers.insert(transfer.id.clone(), transfer);
                }
                LedgerOp::PutRefund(refund) => staged.refunds.push(refund),
            }
        }

        tables.payments.extend(staged.payments);
        tables.disputes.extend(staged.disputes);
        tables.transfers.extend(staged.transfers);
        tables.refunds.extend(staged.refunds);
        Ok(())
    }
}

fn decode_job(id: &JobId, doc: &serde_json::Value) -> Result<Job, LedgerError> {
    serde_json::from_value(doc.clone()).map_err(|e| LedgerError::Corrupt {
        key: format!("jobs/{id}"),
        message: e.to_string(),
    })
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn get_payment(&self, id: &PaymentId) -> Result<Option<Payment>, LedgerError> {
        Ok(self.tables.read().payments.get(id).cloned())
    }

    async fn insert_payment(&self, payment: Payment) -> Result<bool, LedgerError> {
        let mut tables = self.tables.write();
        if tables.payments.contains_key(&payment.id) {
            return Ok(false);
        }
        tables.payments.insert(payment.id.clone(), payment);
        Ok(true)
    }

    async fn find_payment_by_charge(
        &self,
        charge: &ChargeId,
    ) -> Result<Option<Payment>, LedgerError> {
        Ok(self
            .tables
            .read()
            .payments
            .values()
            .find(|p| p.charge_id.as_ref() == Some(charge))
            .cloned())
    }

    async fn list_releasable(&self, now: Timestamp) -> Result<Vec<Payment>, LedgerError> {
        let mut due: Vec<Payment> = self
            .tables
            .read()
            .payments
            .values()
            .filter(|p| {
                p.status == PaymentStatus::Captured
                    && p.escrow_hold_until.is_some_and(|hold| hold <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|p| p.escrow_hold_until);
        Ok(due)
    }

    async fn get_transfer(&self, id: &TransferId) -> Result<Option<Transfer>, LedgerError> {
        Ok(self.tables.read().transfers.get(id).cloned())
    }

    async fn list_refunds(&self, payment: &PaymentId) -> Result<Vec<Refund>, LedgerError> {
        Ok(self
            .tables
            .read()
            .refunds
            .iter()
            .filter(|r| &r.payment_id == payment)
            .cloned()
            .collect())
    }

    async fn get_dispute(&self, id: &CaseId) -> Result<Option<Dispute>, LedgerError> {
        Ok(self.tables.read().disputes.get(id).cloned())
    }

    async fn active_dispute_for_job(&self, job: &JobId) -> Result<Option<Dispute>, LedgerError> {
        Ok(self
            .tables
            .read()
            .disputes
            .values()
            .find(|d| &d.job_id == job && d.status.is_active())
            .cloned())
    }

    async fn insert_dispute_exclusive(
        &self,
        dispute: Dispute,
    ) -> Result<DisputeInsert, LedgerError> {
        let mut tables = self.tables.write();
        if let Some(active) = tables
            .disputes
            .values()
            .find(|d| d.job_id == dispute.job_id && d.status.is_active())
        {
            return Ok(DisputeInsert::Conflict(active.case_id));
        }
        tables.disputes.insert(dispute.case_id, dispute);
        Ok(DisputeInsert::Inserted)
    }

    async fn list_disputes_by_status(
        &self,
        statuses: &[DisputeStatus],
    ) -> Result<Vec<Dispute>, LedgerError> {
        let mut found: Vec<Dispute> = self
            .tables
            .read()
            .disputes
            .values()
            .filter(|d| statuses.contains(&d.status))
            .cloned()
            .collect();
        found.sort_by_key(|d| d.created_at);
        Ok(found)
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, LedgerError> {
        let tables = self.tables.read();
        tables.jobs.get(id).map(|doc| decode_job(id, doc)).transpose()
    }

    async fn patch_job(&self, id: &JobId, patch: JobPatch) -> Result<bool, LedgerError> {
        let fields = serde_json::to_value(&patch).map_err(|e| LedgerError::Backend(e.to_string()))?;
        let mut tables = self.tables.write();
        let Some(doc) = tables.jobs.get_mut(id) else {
            return Ok(false);
        };
        if let (Some(target), serde_json::Value::Object(fields)) = (doc.as_object_mut(), fields) {
            target.extend(fields);
        }
        Ok(true)
    }

    async fn get_connected_account(
        &self,
        id: &ConnectedAccountId,
    ) -> Result<Option<ConnectedAccount>, LedgerError> {
        Ok(self.tables.read().accounts.get(id).cloned())
    }

    async fn upsert_connected_account(
        &self,
        account: ConnectedAccount,
    ) -> Result<(), LedgerError> {
        self.tables
            .write()
            .accounts
            .insert(account.id.clone(), account);
        Ok(())
    }

    async fn commit(&self, tx: LedgerTransaction) -> Result<(), EscrowError> {
        self.commit_sync(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use fixmate_core::{Money, Uid};
    use rust_decimal_macros::dec;

    fn t0() -> Timestamp {
        Timestamp::from_epoch_secs(1_767_000_000).unwrap()
    }

    fn payment(id: &str) -> Payment {
        Payment::pending(
            PaymentId::new(id),
            JobId::new("job-1"),
            Uid::new("cust-1"),
            Money::new(dec!(100)),
            "eur".into(),
            None,
            t0(),
        )
    }

    #[tokio::test]
    async fn insert_payment_keeps_first() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.insert_payment(payment("pi_1")).await.unwrap());
        let mut dup = payment("pi_1");
        dup.currency = "usd".into();
        assert!(!ledger.insert_payment(dup).await.unwrap());
        let stored = ledger.get_payment(&PaymentId::new("pi_1")).await.unwrap().unwrap();
        assert_eq!(stored.currency, "eur");
    }

    #[tokio::test]
    async fn failed_commit_writes_nothing() {
        let ledger = InMemoryLedger::new();
        ledger.put_payment(payment("pi_1"));
        let tx = LedgerTransaction::new()
            .update_payment(PaymentId::new("pi_1"), |p| {
                p.currency = "usd".into();
                Ok(())
            })
            .update_dispute(CaseId::new(), |_| Ok(()));
        let err = ledger.commit(tx).await.unwrap_err();
        assert!(matches!(err, EscrowError::DisputeNotFound(_)));
        let stored = ledger.get_payment(&PaymentId::new("pi_1")).await.unwrap().unwrap();
        assert_eq!(stored.currency, "eur");
    }

    #[tokio::test]
    async fn staged_updates_chain_within_one_commit() {
        let ledger = InMemoryLedger::new();
        ledger.put_payment(payment("pi_1"));
        let tx = LedgerTransaction::new()
            .update_payment(PaymentId::new("pi_1"), |p| {
                p.refund_count += 1;
                Ok(())
            })
            .update_payment(PaymentId::new("pi_1"), |p| {
                p.refund_count += 1;
                Ok(())
            });
        ledger.commit(tx).await.unwrap();
        let stored = ledger.get_payment(&PaymentId::new("pi_1")).await.unwrap().unwrap();
        assert_eq!(stored.refund_count, 2);
    }

    #[tokio::test]
    async fn job_patch_preserves_foreign_fields() {
        let ledger = InMemoryLedger::new();
        let id = JobId::new("job-1");
        ledger.put_job_document(
            id.clone(),
            serde_json::json!({
                "id": "job-1",
                "customerUid": "cust-1",
                "status": "open",
                "leadScore": 0.82
            }),
        );
        let patched = ledger
            .patch_job(&id, JobPatch::payment(&PaymentId::new("pi_1"), PaymentStatus::Captured, t0()).with_status(JobStatus::Assigned))
            .await
            .unwrap();
        assert!(patched);
        let doc = ledger.job_document(&id).unwrap();
        assert_eq!(doc["leadScore"], 0.82);
        assert_eq!(doc["status"], "assigned");
        assert_eq!(doc["paymentStatus"], "captured");
        assert!(!ledger.patch_job(&JobId::new("missing"), JobPatch::default()).await.unwrap());
    }

    #[tokio::test]
    async fn releasable_filters_by_status_and_hold() {
        let ledger = InMemoryLedger::new();
        let mut due = payment("pi_due");
        due.capture(None, t0(), chrono::Duration::days(7)).unwrap();
        let mut held = payment("pi_held");
        held.capture(None, t0().plus(chrono::Duration::days(1)), chrono::Duration::days(7)).unwrap();
        ledger.put_payment(due);
        ledger.put_payment(held);
        ledger.put_payment(payment("pi_pending"));
        let now = t0().plus(chrono::Duration::days(7));
        let found = ledger.list_releasable(now).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, PaymentId::new("pi_due"));
    }
}
