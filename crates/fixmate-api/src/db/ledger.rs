//! Postgres implementation of the escrow [`LedgerStore`].
//!
//! Records are stored as JSONB documents next to the columns used for
//! lookups and locking. [`LedgerStore::commit`] runs every step inside one
//! transaction, re-reading each record with `SELECT ... FOR UPDATE` before
//! applying its mutation. Any failing step drops the transaction, which
//! rolls back every earlier write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fixmate_core::{CaseId, ChargeId, ConnectedAccountId, JobId, PaymentId, Timestamp, TransferId};
use fixmate_escrow::payment::ConnectedAccount;
use fixmate_escrow::ports::{DisputeInsert, LedgerOp, LedgerTransaction};
use fixmate_escrow::{
    Dispute, DisputeStatus, EscrowError, Job, JobPatch, LedgerError, LedgerStore, Payment, Refund,
    Transfer,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row};

const ACTIVE_DISPUTE_STATUSES: [&str; 2] = ["open", "under_review"];

#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// -- Encoding helpers ---------------------------------------------------------

fn backend(err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            LedgerError::Unavailable(err.to_string())
        }
        other => LedgerError::Backend(other.to_string()),
    }
}

fn encode<T: Serialize>(value: &T) -> Result<serde_json::Value, LedgerError> {
    serde_json::to_value(value).map_err(|e| LedgerError::Backend(format!("encode: {e}")))
}

fn decode<T: DeserializeOwned>(table: &str, row: &PgRow) -> Result<T, LedgerError> {
    let doc: serde_json::Value = row.try_get("doc").map_err(backend)?;
    let key = doc
        .get("id")
        .or_else(|| doc.get("caseId"))
        .and_then(|v| v.as_str())
        .unwrap_or("?")
        .to_string();
    serde_json::from_value(doc).map_err(|e| LedgerError::Corrupt {
        key: format!("{table}/{key}"),
        message: e.to_string(),
    })
}

/// The serde name of a unit enum variant, e.g. `"under_review"`.
fn status_str<T: Serialize>(status: &T) -> Result<String, LedgerError> {
    match encode(status)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(LedgerError::Backend(format!("status is not a string: {other}"))),
    }
}

fn utc(ts: Timestamp) -> DateTime<Utc> {
    *ts.as_datetime()
}

// -- Row writers --------------------------------------------------------------

async fn upsert_payment<'e, E>(exec: E, payment: &Payment) -> Result<(), LedgerError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO payments (id, job_id, charge_id, status, escrow_hold_until, doc)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (id) DO UPDATE SET
             charge_id = EXCLUDED.charge_id,
             status = EXCLUDED.status,
             escrow_hold_until = EXCLUDED.escrow_hold_until,
             doc = EXCLUDED.doc",
    )
    .bind(payment.id.as_str())
    .bind(payment.job_id.as_str())
    .bind(payment.charge_id.as_ref().map(|c| c.as_str()))
    .bind(status_str(&payment.status)?)
    .bind(payment.escrow_hold_until.map(utc))
    .bind(encode(payment)?)
    .execute(exec)
    .await
    .map_err(backend)?;
    Ok(())
}

async fn upsert_transfer<'e, E>(exec: E, transfer: &Transfer) -> Result<(), LedgerError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO transfers (id, payment_id, doc) VALUES ($1, $2, $3)
         ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc",
    )
    .bind(transfer.id.as_str())
    .bind(transfer.payment_id.as_str())
    .bind(encode(transfer)?)
    .execute(exec)
    .await
    .map_err(backend)?;
    Ok(())
}

async fn insert_refund<'e, E>(exec: E, refund: &Refund) -> Result<(), LedgerError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO refunds (id, payment_id, created_at, doc) VALUES ($1, $2, $3, $4)",
    )
    .bind(refund.id.as_str())
    .bind(refund.payment_id.as_str())
    .bind(utc(refund.created_at))
    .bind(encode(refund)?)
    .execute(exec)
    .await
    .map_err(backend)?;
    Ok(())
}

async fn update_dispute<'e, E>(exec: E, dispute: &Dispute) -> Result<(), LedgerError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query("UPDATE disputes SET status = $2, doc = $3 WHERE case_id = $1")
        .bind(*dispute.case_id.as_uuid())
        .bind(status_str(&dispute.status)?)
        .bind(encode(dispute)?)
        .execute(exec)
        .await
        .map_err(backend)?;
    Ok(())
}

// -- LedgerStore --------------------------------------------------------------

#[async_trait]
impl LedgerStore for PgLedger {
    async fn get_payment(&self, id: &PaymentId) -> Result<Option<Payment>, LedgerError> {
        let row = sqlx::query("SELECT doc FROM payments WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| decode("payments", &r)).transpose()
    }

    async fn insert_payment(&self, payment: Payment) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            "INSERT INTO payments (id, job_id, charge_id, status, escrow_hold_until, doc)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(payment.id.as_str())
        .bind(payment.job_id.as_str())
        .bind(payment.charge_id.as_ref().map(|c| c.as_str()))
        .bind(status_str(&payment.status)?)
        .bind(payment.escrow_hold_until.map(utc))
        .bind(encode(&payment)?)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_payment_by_charge(
        &self,
        charge: &ChargeId,
    ) -> Result<Option<Payment>, LedgerError> {
        let row = sqlx::query("SELECT doc FROM payments WHERE charge_id = $1 LIMIT 1")
            .bind(charge.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| decode("payments", &r)).transpose()
    }

    async fn list_releasable(&self, now: Timestamp) -> Result<Vec<Payment>, LedgerError> {
        let rows = sqlx::query(
            "SELECT doc FROM payments
             WHERE status = 'captured' AND escrow_hold_until <= $1
             ORDER BY escrow_hold_until",
        )
        .bind(utc(now))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(|r| decode("payments", r)).collect()
    }

    async fn get_transfer(&self, id: &TransferId) -> Result<Option<Transfer>, LedgerError> {
        let row = sqlx::query("SELECT doc FROM transfers WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| decode("transfers", &r)).transpose()
    }

    async fn list_refunds(&self, payment: &PaymentId) -> Result<Vec<Refund>, LedgerError> {
        let rows = sqlx::query(
            "SELECT doc FROM refunds WHERE payment_id = $1 ORDER BY created_at, id",
        )
        .bind(payment.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(|r| decode("refunds", r)).collect()
    }

    async fn get_dispute(&self, id: &CaseId) -> Result<Option<Dispute>, LedgerError> {
        let row = sqlx::query("SELECT doc FROM disputes WHERE case_id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| decode("disputes", &r)).transpose()
    }

    async fn active_dispute_for_job(&self, job: &JobId) -> Result<Option<Dispute>, LedgerError> {
        let row = sqlx::query(
            "SELECT doc FROM disputes WHERE job_id = $1 AND status = ANY($2) LIMIT 1",
        )
        .bind(job.as_str())
        .bind(&ACTIVE_DISPUTE_STATUSES[..])
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.map(|r| decode("disputes", &r)).transpose()
    }

    async fn insert_dispute_exclusive(
        &self,
        dispute: Dispute,
    ) -> Result<DisputeInsert, LedgerError> {
        // The partial unique index makes the check and the insert one step.
        let result = sqlx::query(
            "INSERT INTO disputes (case_id, job_id, status, created_at, doc)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (job_id) WHERE status IN ('open', 'under_review') DO NOTHING",
        )
        .bind(*dispute.case_id.as_uuid())
        .bind(dispute.job_id.as_str())
        .bind(status_str(&dispute.status)?)
        .bind(utc(dispute.created_at))
        .bind(encode(&dispute)?)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() > 0 {
            return Ok(DisputeInsert::Inserted);
        }
        match self.active_dispute_for_job(&dispute.job_id).await? {
            Some(active) => Ok(DisputeInsert::Conflict(active.case_id)),
            None => Err(LedgerError::Backend(format!(
                "dispute insert for job {} conflicted but no active dispute was found",
                dispute.job_id
            ))),
        }
    }

    async fn list_disputes_by_status(
        &self,
        statuses: &[DisputeStatus],
    ) -> Result<Vec<Dispute>, LedgerError> {
        let names = statuses
            .iter()
            .map(status_str)
            .collect::<Result<Vec<_>, _>>()?;
        let rows = sqlx::query(
            "SELECT doc FROM disputes WHERE status = ANY($1) ORDER BY created_at",
        )
        .bind(&names)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(|r| decode("disputes", r)).collect()
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, LedgerError> {
        let row = sqlx::query("SELECT doc FROM jobs WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| decode("jobs", &r)).transpose()
    }

    async fn patch_job(&self, id: &JobId, patch: JobPatch) -> Result<bool, LedgerError> {
        let result = sqlx::query("UPDATE jobs SET doc = doc || $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(encode(&patch)?)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_connected_account(
        &self,
        id: &ConnectedAccountId,
    ) -> Result<Option<ConnectedAccount>, LedgerError> {
        let row = sqlx::query("SELECT doc FROM connected_accounts WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| decode("connected_accounts", &r)).transpose()
    }

    async fn upsert_connected_account(
        &self,
        account: ConnectedAccount,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO connected_accounts (id, doc) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc",
        )
        .bind(account.id.as_str())
        .bind(encode(&account)?)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn commit(&self, tx: LedgerTransaction) -> Result<(), EscrowError> {
        let mut db = self.pool.begin().await.map_err(backend)?;

        for op in tx.into_ops() {
            match op {
                LedgerOp::UpdatePayment { id, mutate } => {
                    let row = sqlx::query("SELECT doc FROM payments WHERE id = $1 FOR UPDATE")
                        .bind(id.as_str())
                        .fetch_optional(&mut *db)
                        .await
                        .map_err(backend)?;
                    let Some(row) = row else {
                        return Err(EscrowError::PaymentNotFound(id));
                    };
                    let mut payment: Payment = decode("payments", &row)?;
                    mutate(&mut payment)?;
                    upsert_payment(&mut *db, &payment).await?;
                }
                LedgerOp::UpdateDispute { id, mutate } => {
                    let row = sqlx::query("SELECT doc FROM disputes WHERE case_id = $1 FOR UPDATE")
                        .bind(*id.as_uuid())
                        .fetch_optional(&mut *db)
                        .await
                        .map_err(backend)?;
                    let Some(row) = row else {
                        return Err(EscrowError::DisputeNotFound(id));
                    };
                    let mut dispute: Dispute = decode("disputes", &row)?;
                    mutate(&mut dispute)?;
                    update_dispute(&mut *db, &dispute).await?;
                }
                LedgerOp::UpdateTransfer { id, mutate } => {
                    let row = sqlx::query("SELECT doc FROM transfers WHERE id = $1 FOR UPDATE")
                        .bind(id.as_str())
                        .fetch_optional(&mut *db)
                        .await
                        .map_err(backend)?;
                    let Some(row) = row else {
                        return Err(EscrowError::TransferNotFound(id));
                    };
                    let mut transfer: Transfer = decode("transfers", &row)?;
                    mutate(&mut transfer)?;
                    upsert_transfer(&mut *db, &transfer).await?;
                }
                LedgerOp::PutTransfer(transfer) => upsert_transfer(&mut *db, &transfer).await?,
                LedgerOp::PutRefund(refund) => insert_refund(&mut *db, &refund).await?,
            }
        }

        db.commit().await.map_err(backend)?;
        Ok(())
    }
}
