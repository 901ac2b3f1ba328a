//! Job view and partial-field patches.
//!
//! Jobs are owned by several subsystems (matching, escrow, disputes), so the
//! escrow core never writes a whole job document. It reads the fields it
//! needs and writes through [`JobPatch`], which only names the fields it
//! touches.

use fixmate_core::{CaseId, JobId, PaymentId, Timestamp, Uid};
use serde::{Deserialize, Serialize};

use crate::dispute::DisputeStatus;
use crate::payment::PaymentStatus;

/// Job lifecycle status as stored by the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
    /// Forward-compatible catch-all.
    #[serde(other)]
    Unknown,
}

/// The fields of a job document the escrow core reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub customer_uid: Uid,
    #[serde(default)]
    pub assigned_pro_uid: Option<Uid>,
    pub status: JobStatus,
}

/// A partial update to a job document. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<PaymentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_case_id: Option<CaseId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_status: Option<DisputeStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

impl JobPatch {
    pub fn payment(payment_id: &PaymentId, status: PaymentStatus, now: Timestamp) -> Self {
        Self {
            payment_id: Some(payment_id.clone()),
            payment_status: Some(status),
            updated_at: Some(now),
            ..Self::default()
        }
    }

    pub fn dispute(case_id: CaseId, status: DisputeStatus, now: Timestamp) -> Self {
        Self {
            dispute_case_id: Some(case_id),
            dispute_status: Some(status),
            updated_at: Some(now),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
