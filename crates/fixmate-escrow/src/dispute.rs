//! # Dispute Lifecycle
//!
//! A dispute is a customer-initiated complaint against a captured payment.
//!
//! ## State Machine
//!
//! ```text
//! Open ──first pro response──▶ UnderReview ──admin decision──▶ Resolved*
//!   │                               │
//!   └──pro deadline passed──▶ Expired ◀──decision deadline passed
//! ```
//!
//! Terminal states: `ResolvedRefundFull`, `ResolvedRefundPartial`,
//! `ResolvedNoRefund`, `Expired`. At most one dispute per job may be in an
//! active state (`Open` or `UnderReview`).

use fixmate_core::{CaseId, JobId, Money, PaymentId, RefundId, Timestamp, Uid};
use serde::{Deserialize, Serialize};

use crate::error::EscrowError;

// ── Status ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    /// Awaiting the provider's first response.
    Open,
    /// Both sides heard; awaiting an admin decision.
    UnderReview,
    ResolvedRefundFull,
    ResolvedRefundPartial,
    ResolvedNoRefund,
    /// A deadline passed unattended.
    Expired,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::UnderReview => "under_review",
            Self::ResolvedRefundFull => "resolved_refund_full",
            Self::ResolvedRefundPartial => "resolved_refund_partial",
            Self::ResolvedNoRefund => "resolved_no_refund",
            Self::Expired => "expired",
        }
    }

    /// `Open` or `UnderReview`.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Open | Self::UnderReview)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Statuses reachable in one step.
    pub fn valid_transitions(&self) -> &'static [DisputeStatus] {
        match self {
            Self::Open => &[
                Self::UnderReview,
                Self::ResolvedRefundFull,
                Self::ResolvedRefundPartial,
                Self::ResolvedNoRefund,
                Self::Expired,
            ],
            Self::UnderReview => &[
                Self::ResolvedRefundFull,
                Self::ResolvedRefundPartial,
                Self::ResolvedNoRefund,
                Self::Expired,
            ],
            _ => &[],
        }
    }

    pub const ACTIVE: [DisputeStatus; 2] = [Self::Open, Self::UnderReview];
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Decision ───────────────────────────────────────────────────────────

/// Admin ruling on a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    RefundFull,
    RefundPartial,
    NoRefund,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RefundFull => "refund_full",
            Self::RefundPartial => "refund_partial",
            Self::NoRefund => "no_refund",
        }
    }

    /// The terminal status this decision resolves to.
    pub fn resolved_status(&self) -> DisputeStatus {
        match self {
            Self::RefundFull => DisputeStatus::ResolvedRefundFull,
            Self::RefundPartial => DisputeStatus::ResolvedRefundPartial,
            Self::NoRefund => DisputeStatus::ResolvedNoRefund,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Parties, Evidence, Audit ───────────────────────────────────────────

/// Which side of the case an evidence submission speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Customer,
    Pro,
}

impl PartyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Pro => "pro",
        }
    }
}

/// One evidence or response entry. At least one of `text` and `media_path`
/// is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceEntry {
    pub author: Uid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_path: Option<String>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    MovedToReview,
    Resolved,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Acting uid, or `system` for sweeps.
    pub actor: String,
    pub action: AuditAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: Timestamp,
}

/// Actor name recorded for scheduled transitions.
pub const SYSTEM_ACTOR: &str = "system";

// ── Dispute ────────────────────────────────────────────────────────────

/// A complaint against a captured payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispute {
    pub case_id: CaseId,
    pub job_id: JobId,
    pub payment_id: PaymentId,
    pub customer_uid: Uid,
    pub pro_uid: Option<Uid>,
    pub opened_by: Uid,
    pub reason: String,
    pub description: String,
    pub requested_amount: Money,
    pub evidence: Vec<EvidenceEntry>,
    pub pro_response: Vec<EvidenceEntry>,
    pub status: DisputeStatus,
    pub deadline_pro_response: Timestamp,
    pub deadline_decision: Timestamp,
    pub decision: Option<Decision>,
    pub refund_amount: Option<Money>,
    pub refund_id: Option<RefundId>,
    pub audit: Vec<AuditEntry>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
}

/// Inputs for [`Dispute::open`].
#[derive(Debug, Clone)]
pub struct NewDispute {
    pub job_id: JobId,
    pub payment_id: PaymentId,
    pub customer_uid: Uid,
    pub pro_uid: Option<Uid>,
    pub opened_by: Uid,
    pub reason: String,
    pub description: String,
    pub requested_amount: Money,
    pub media_paths: Vec<String>,
}

impl Dispute {
    /// Create an `Open` dispute with deadlines offset from `now`.
    pub fn open(
        input: NewDispute,
        now: Timestamp,
        pro_response_window: chrono::Duration,
        decision_window: chrono::Duration,
    ) -> Self {
        let evidence = input
            .media_paths
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .map(|path| EvidenceEntry {
                author: input.opened_by.clone(),
                text: None,
                media_path: Some(path),
                timestamp: now,
            })
            .collect();
        Self {
            case_id: CaseId::new(),
            job_id: input.job_id,
            payment_id: input.payment_id,
            customer_uid: input.customer_uid,
            pro_uid: input.pro_uid,
            opened_by: input.opened_by,
            reason: input.reason,
            description: input.description,
            requested_amount: input.requested_amount,
            evidence,
            pro_response: Vec::new(),
            status: DisputeStatus::Open,
            deadline_pro_response: now.plus(pro_response_window),
            deadline_decision: now.plus(decision_window),
            decision: None,
            refund_amount: None,
            refund_id: None,
            audit: Vec::new(),
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    /// Reject transitions out of a terminal state.
    fn require_active(&self, to: DisputeStatus) -> Result<(), EscrowError> {
        if self.status.is_active() && self.status.valid_transitions().contains(&to) {
            return Ok(());
        }
        Err(EscrowError::InvalidDisputeTransition {
            case_id: self.case_id,
            from: self.status.as_str().to_string(),
            to: to.as_str().to_string(),
            reason: if self.status.is_terminal() {
                "dispute is closed".to_string()
            } else {
                "transition not permitted".to_string()
            },
        })
    }

    fn record_transition(&mut self, actor: &str, action: AuditAction, detail: Option<String>, now: Timestamp) {
        self.audit.push(AuditEntry {
            actor: actor.to_string(),
            action,
            detail,
            timestamp: now,
        });
        self.updated_at = now;
    }

    /// Whether `uid` is the given party on this case.
    pub fn is_party(&self, uid: &Uid, role: PartyRole) -> bool {
        match role {
            PartyRole::Customer => &self.customer_uid == uid,
            PartyRole::Pro => self.pro_uid.as_ref() == Some(uid),
        }
    }

    /// The uid on the other side of `role`, if known.
    pub fn counterparty(&self, role: PartyRole) -> Option<&Uid> {
        match role {
            PartyRole::Customer => self.pro_uid.as_ref(),
            PartyRole::Pro => Some(&self.customer_uid),
        }
    }

    /// Append an evidence entry. The first provider entry on an `Open`
    /// dispute moves it to `UnderReview`.
    ///
    /// Returns `true` if the status changed.
    pub fn add_evidence(
        &mut self,
        role: PartyRole,
        entry: EvidenceEntry,
        now: Timestamp,
    ) -> Result<bool, EscrowError> {
        if !self.status.is_active() {
            return Err(EscrowError::InvalidDisputeTransition {
                case_id: self.case_id,
                from: self.status.as_str().to_string(),
                to: self.status.as_str().to_string(),
                reason: "evidence is closed".to_string(),
            });
        }
        let author = entry.author.to_string();
        match role {
            PartyRole::Customer => self.evidence.push(entry),
            PartyRole::Pro => self.pro_response.push(entry),
        }
        self.updated_at = now;
        if role == PartyRole::Pro && self.status == DisputeStatus::Open {
            self.require_active(DisputeStatus::UnderReview)?;
            self.status = DisputeStatus::UnderReview;
            self.record_transition(&author, AuditAction::MovedToReview, None, now);
            return Ok(true);
        }
        Ok(false)
    }

    /// Apply an admin decision.
    pub fn resolve(
        &mut self,
        decision: Decision,
        refund_amount: Money,
        refund_id: Option<RefundId>,
        actor: &Uid,
        now: Timestamp,
    ) -> Result<(), EscrowError> {
        let to = decision.resolved_status();
        self.require_active(to)?;
        self.status = to;
        self.decision = Some(decision);
        self.refund_amount = Some(refund_amount);
        self.refund_id = refund_id;
        self.resolved_at = Some(now);
        self.record_transition(
            actor.as_str(),
            AuditAction::Resolved,
            Some(format!("{decision}; refund {refund_amount}")),
            now,
        );
        Ok(())
    }

    /// Whether the deadline relevant to the current status has passed.
    pub fn is_stale(&self, now: Timestamp) -> bool {
        match self.status {
            DisputeStatus::Open => now > self.deadline_pro_response,
            DisputeStatus::UnderReview => now > self.deadline_decision,
            _ => false,
        }
    }

    /// Expire a stale dispute.
    pub fn expire(&mut self, now: Timestamp) -> Result<(), EscrowError> {
        self.require_active(DisputeStatus::Expired)?;
        if !self.is_stale(now) {
            return Err(EscrowError::ConcurrentModification {
                record: format!("dispute {}", self.case_id),
                reason: "deadline no longer passed".to_string(),
            });
        }
        let from = self.status;
        self.status = DisputeStatus::Expired;
        self.resolved_at = Some(now);
        self.record_transition(
            SYSTEM_ACTOR,
            AuditAction::Expired,
            Some(format!("expired from {from}")),
            now,
        );
        Ok(())
    }

    /// Whether the decision deadline falls within `lookahead` of `now`
    /// (or has already passed) while awaiting a decision.
    pub fn needs_moderation_reminder(&self, now: Timestamp, lookahead: chrono::Duration) -> bool {
        self.status == DisputeStatus::UnderReview && self.deadline_decision <= now.plus(lookahead)
    }
}
