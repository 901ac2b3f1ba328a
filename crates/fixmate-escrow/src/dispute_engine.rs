//! # Dispute Engine
//!
//! Opening, evidence exchange, admin resolution with optional refund, and
//! the expiry and moderation-reminder sweeps.
//!
//! Resolution with a refund calls the processor first and then commits the
//! refund record, the payment's refund totals and the dispute's terminal
//! status in one ledger transaction.

use std::sync::Arc;

use fixmate_core::{CaseId, JobId, Money, PaymentId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::caller::{authenticated, Caller};
use crate::context::Collaborators;
use crate::dispute::{Decision, Dispute, DisputeStatus, EvidenceEntry, NewDispute, PartyRole};
use crate::error::EscrowError;
use crate::job::JobPatch;
use crate::payment::{PaymentStatus, Refund, RefundOrigin};
use crate::ports::{DisputeInsert, LedgerTransaction, RefundRequest};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenDisputeInput {
    pub job_id: JobId,
    pub payment_id: PaymentId,
    pub reason: String,
    #[serde(default)]
    pub description: String,
    pub requested_amount: Money,
    #[serde(default)]
    pub media_paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeOpened {
    pub case_id: CaseId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub success: bool,
    pub refund_amount: Money,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpiryReport {
    /// Distinct disputes moved to `expired`.
    pub updated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReminderReport {
    pub reminded: usize,
}

/// Dispute lifecycle operations.
#[derive(Debug, Clone)]
pub struct DisputeEngine {
    ctx: Collaborators,
}

impl DisputeEngine {
    pub fn new(ctx: Collaborators) -> Self {
        Self { ctx }
    }

    /// Open a dispute against a captured payment.
    pub async fn open_dispute(
        &self,
        caller: Option<&Caller>,
        input: OpenDisputeInput,
    ) -> Result<DisputeOpened, EscrowError> {
        let caller = authenticated(caller)?;
        if input.job_id.is_empty() || input.payment_id.is_empty() {
            return Err(EscrowError::InvalidArgument(
                "jobId and paymentId are required".into(),
            ));
        }
        let reason = input.reason.trim().to_string();
        if reason.is_empty() {
            return Err(EscrowError::InvalidArgument("reason is required".into()));
        }
        if input.requested_amount < Money::ZERO {
            return Err(EscrowError::InvalidArgument(
                "requestedAmount must not be negative".into(),
            ));
        }

        let payment = self
            .ctx
            .ledger
            .get_payment(&input.payment_id)
            .await?
            .ok_or_else(|| EscrowError::PaymentNotFound(input.payment_id.clone()))?;
        if caller.uid != payment.customer_uid {
            return Err(EscrowError::denied(
                "open_dispute",
                "only the paying customer may open a dispute",
            ));
        }
        if payment.job_id != input.job_id {
            return Err(EscrowError::InvalidArgument(format!(
                "payment {} does not belong to job {}",
                payment.id, input.job_id
            )));
        }
        let captured_at = match (payment.status, payment.captured_at) {
            (PaymentStatus::Captured, Some(at)) => at,
            _ => {
                return Err(EscrowError::InvalidPaymentState {
                    payment_id: payment.id.clone(),
                    operation: "open_dispute",
                    status: payment.status.as_str().to_string(),
                })
            }
        };

        let now = self.ctx.clock.now();
        let deadline = captured_at.plus(self.ctx.policy.dispute_window);
        if now > deadline {
            return Err(EscrowError::DisputeWindowClosed {
                payment_id: payment.id.clone(),
                deadline,
            });
        }
        if let Some(active) = self.ctx.ledger.active_dispute_for_job(&payment.job_id).await? {
            return Err(EscrowError::DisputeAlreadyActive {
                job_id: payment.job_id.clone(),
                case_id: active.case_id,
            });
        }
        if input.requested_amount > payment.amount_gross {
            return Err(EscrowError::AmountOutOfRange {
                requested: input.requested_amount.to_string(),
                maximum: payment.amount_gross.to_string(),
            });
        }

        let pro_uid = self
            .ctx
            .ledger
            .get_job(&payment.job_id)
            .await?
            .and_then(|job| job.assigned_pro_uid)
            .or_else(|| payment.pro_uid.clone());

        let dispute = Dispute::open(
            NewDispute {
                job_id: payment.job_id.clone(),
                payment_id: payment.id.clone(),
                customer_uid: payment.customer_uid.clone(),
                pro_uid: pro_uid.clone(),
                opened_by: caller.uid.clone(),
                reason: reason.clone(),
                description: input.description.trim().to_string(),
                requested_amount: input.requested_amount,
                media_paths: input.media_paths,
            },
            now,
            self.ctx.policy.pro_response_window,
            self.ctx.policy.decision_window,
        );
        let case_id = dispute.case_id;
        let deadline_pro_response = dispute.deadline_pro_response;

        if let DisputeInsert::Conflict(existing) =
            self.ctx.ledger.insert_dispute_exclusive(dispute).await?
        {
            return Err(EscrowError::DisputeAlreadyActive {
                job_id: payment.job_id.clone(),
                case_id: existing,
            });
        }
        tracing::info!(
            case_id = %case_id,
            job_id = %payment.job_id,
            payment_id = %payment.id,
            requested_amount = %input.requested_amount,
            "dispute opened"
        );

        self.patch_job(
            &payment.job_id,
            JobPatch::dispute(case_id, DisputeStatus::Open, now),
        )
        .await;

        match &pro_uid {
            Some(pro) => {
                self.ctx
                    .effects
                    .notify(
                        pro,
                        "A customer opened a dispute",
                        &format!(
                            "Please respond before {}.",
                            deadline_pro_response.to_iso8601()
                        ),
                        [
                            ("type", "dispute_opened".to_string()),
                            ("caseId", case_id.to_string()),
                            ("jobId", payment.job_id.to_string()),
                        ],
                    )
                    .await;
            }
            None => tracing::warn!(case_id = %case_id, "no assigned pro to notify"),
        }
        self.ctx
            .effects
            .track(
                "dispute_opened",
                Some(&caller.uid),
                Some("customer"),
                serde_json::json!({
                    "caseId": case_id,
                    "jobId": payment.job_id,
                    "paymentId": payment.id,
                    "reason": reason,
                    "requestedAmount": input.requested_amount,
                }),
            )
            .await;

        Ok(DisputeOpened { case_id })
    }

    /// Append evidence from one side of the case.
    pub async fn add_evidence(
        &self,
        caller: Option<&Caller>,
        case_id: CaseId,
        role: PartyRole,
        text: Option<String>,
        media_path: Option<String>,
    ) -> Result<(), EscrowError> {
        let caller = authenticated(caller)?;
        let text = non_blank(text);
        let media_path = non_blank(media_path);
        if text.is_none() && media_path.is_none() {
            return Err(EscrowError::InvalidArgument(
                "evidence needs text or a media path".into(),
            ));
        }

        let dispute = self.load_dispute(case_id).await?;
        if !dispute.is_party(&caller.uid, role) {
            return Err(EscrowError::denied(
                "add_evidence",
                format!("caller is not the {} on this case", role.as_str()),
            ));
        }
        if !dispute.status.is_active() {
            return Err(EscrowError::InvalidDisputeTransition {
                case_id,
                from: dispute.status.as_str().to_string(),
                to: dispute.status.as_str().to_string(),
                reason: "evidence is closed".to_string(),
            });
        }

        let now = self.ctx.clock.now();
        let entry = EvidenceEntry {
            author: caller.uid.clone(),
            text,
            media_path,
            timestamp: now,
        };
        let moved = Arc::new(Mutex::new(false));
        let moved_out = Arc::clone(&moved);
        let tx = LedgerTransaction::new().update_dispute(case_id, move |d| {
            *moved_out.lock() = d.add_evidence(role, entry, now)?;
            Ok(())
        });
        self.ctx.ledger.commit(tx).await?;
        let moved_to_review = *moved.lock();
        tracing::info!(case_id = %case_id, role = role.as_str(), moved_to_review, "evidence added");

        if moved_to_review {
            self.patch_job(
                &dispute.job_id,
                JobPatch::dispute(case_id, DisputeStatus::UnderReview, now),
            )
            .await;
        }
        if let Some(other) = dispute.counterparty(role) {
            self.ctx
                .effects
                .notify(
                    other,
                    "New evidence in your dispute",
                    "The other party added information to the case.",
                    [
                        ("type", "dispute_evidence".to_string()),
                        ("caseId", case_id.to_string()),
                    ],
                )
                .await;
        }
        self.ctx
            .effects
            .track(
                "dispute_evidence_added",
                Some(&caller.uid),
                Some(role.as_str()),
                serde_json::json!({ "caseId": case_id, "movedToReview": moved_to_review }),
            )
            .await;
        Ok(())
    }

    /// Apply an admin decision, refunding through the processor if the
    /// decision calls for it.
    pub async fn resolve_dispute(
        &self,
        caller: Option<&Caller>,
        case_id: CaseId,
        decision: Decision,
        amount: Option<Money>,
    ) -> Result<Resolution, EscrowError> {
        let caller = authenticated(caller)?;
        if !self.ctx.admins.is_admin(caller).await? {
            return Err(EscrowError::denied(
                "resolve_dispute",
                "only admins may resolve disputes",
            ));
        }
        let dispute = self.load_dispute(case_id).await?;
        if !dispute.status.is_active() {
            return Err(EscrowError::InvalidDisputeTransition {
                case_id,
                from: dispute.status.as_str().to_string(),
                to: decision.resolved_status().as_str().to_string(),
                reason: "dispute is closed".to_string(),
            });
        }
        let payment = self
            .ctx
            .ledger
            .get_payment(&dispute.payment_id)
            .await?
            .ok_or_else(|| EscrowError::PaymentNotFound(dispute.payment_id.clone()))?;

        let refund_amount = match decision {
            Decision::RefundFull => {
                let remaining = payment.remaining();
                if !remaining.is_positive() {
                    return Err(EscrowError::NothingToRefund(payment.id.clone()));
                }
                remaining
            }
            Decision::RefundPartial => {
                let requested = amount.ok_or_else(|| {
                    EscrowError::InvalidArgument("amount is required for refund_partial".into())
                })?;
                let maximum = payment.amount_gross.min(payment.remaining());
                if !requested.is_positive() || requested > maximum {
                    return Err(EscrowError::AmountOutOfRange {
                        requested: requested.to_string(),
                        maximum: maximum.to_string(),
                    });
                }
                requested
            }
            Decision::NoRefund => Money::ZERO,
        };

        let now = self.ctx.clock.now();
        let actor = caller.uid.clone();
        let tx = if refund_amount.is_positive() {
            payment.check_refundable(refund_amount)?;
            let expected_count = payment.refund_count;
            let created = self
                .ctx
                .gateway
                .create_refund(RefundRequest {
                    payment_id: payment.id.clone(),
                    amount_minor: refund_amount.to_minor_units()?,
                    reason: Some(format!("dispute {case_id}: {decision}")),
                    idempotency_key: format!("refund:{}:dispute:{}", payment.id, case_id),
                })
                .await
                .map_err(|e| {
                    tracing::error!(case_id = %case_id, payment_id = %payment.id, error = %e, "dispute refund failed");
                    e
                })?;
            let refund_id = created.id.clone();
            LedgerTransaction::new()
                .update_payment(payment.id.clone(), move |p| {
                    p.record_refund_issued(refund_amount, expected_count, now)?;
                    p.mark_refunded(now)
                })
                .put_refund(Refund {
                    id: created.id,
                    payment_id: payment.id.clone(),
                    amount: refund_amount,
                    currency: payment.currency.clone(),
                    reason: Some(dispute.reason.clone()),
                    origin: RefundOrigin::Dispute { case_id },
                    requested_by: caller.uid.clone(),
                    created_at: now,
                })
                .update_dispute(case_id, move |d| {
                    d.resolve(decision, refund_amount, Some(refund_id), &actor, now)
                })
        } else {
            LedgerTransaction::new().update_dispute(case_id, move |d| {
                d.resolve(decision, Money::ZERO, None, &actor, now)
            })
        };
        self.ctx.ledger.commit(tx).await.map_err(|e| {
            tracing::error!(case_id = %case_id, error = %e, "dispute resolution commit failed");
            e
        })?;
        tracing::info!(
            case_id = %case_id,
            decision = %decision,
            refund_amount = %refund_amount,
            "dispute resolved"
        );

        let mut patch = JobPatch::dispute(case_id, decision.resolved_status(), now);
        if refund_amount.is_positive() {
            patch.payment_id = Some(payment.id.clone());
            patch.payment_status = Some(PaymentStatus::Refunded);
        }
        self.patch_job(&dispute.job_id, patch).await;

        let body = match decision {
            Decision::NoRefund => "The dispute was closed without a refund.".to_string(),
            _ => format!(
                "A refund of {} {} was issued.",
                refund_amount,
                payment.currency.to_uppercase()
            ),
        };
        let parties = std::iter::once(&dispute.customer_uid).chain(dispute.pro_uid.as_ref());
        for party in parties {
            self.ctx
                .effects
                .notify(
                    party,
                    "Your dispute was resolved",
                    &body,
                    [
                        ("type", "dispute_resolved".to_string()),
                        ("caseId", case_id.to_string()),
                        ("decision", decision.as_str().to_string()),
                    ],
                )
                .await;
        }
        self.ctx
            .effects
            .track(
                "dispute_resolved",
                Some(&caller.uid),
                Some("admin"),
                serde_json::json!({
                    "caseId": case_id,
                    "decision": decision,
                    "refundAmount": refund_amount,
                }),
            )
            .await;

        Ok(Resolution {
            success: true,
            refund_amount,
        })
    }

    /// Expire active disputes whose current deadline has passed. Each
    /// dispute counts once.
    pub async fn expire_disputes(&self) -> Result<ExpiryReport, EscrowError> {
        let now = self.ctx.clock.now();
        let candidates = self
            .ctx
            .ledger
            .list_disputes_by_status(&DisputeStatus::ACTIVE)
            .await?;
        let mut report = ExpiryReport::default();

        for dispute in candidates.into_iter().filter(|d| d.is_stale(now)) {
            let case_id = dispute.case_id;
            let tx = LedgerTransaction::new().update_dispute(case_id, move |d| d.expire(now));
            match self.ctx.ledger.commit(tx).await {
                Ok(()) => {}
                Err(e) if e.is_stale_state() => {
                    tracing::debug!(case_id = %case_id, "dispute changed before expiry");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(case_id = %case_id, error = %e, "dispute expiry failed");
                    report.failed += 1;
                    continue;
                }
            }
            report.updated += 1;
            tracing::info!(case_id = %case_id, from = %dispute.status, "dispute expired");

            self.patch_job(
                &dispute.job_id,
                JobPatch::dispute(case_id, DisputeStatus::Expired, now),
            )
            .await;
            self.ctx
                .effects
                .track(
                    "dispute_expired",
                    None,
                    None,
                    serde_json::json!({ "caseId": case_id, "from": dispute.status }),
                )
                .await;
        }

        tracing::info!(updated = report.updated, failed = report.failed, "dispute expiry sweep finished");
        Ok(report)
    }

    /// Flag disputes awaiting a decision whose deadline is near or past.
    pub async fn remind_moderation(&self) -> Result<ReminderReport, EscrowError> {
        let now = self.ctx.clock.now();
        let lookahead = self.ctx.policy.reminder_lookahead;
        let under_review = self
            .ctx
            .ledger
            .list_disputes_by_status(&[DisputeStatus::UnderReview])
            .await?;
        let mut report = ReminderReport::default();

        for dispute in under_review
            .iter()
            .filter(|d| d.needs_moderation_reminder(now, lookahead))
        {
            let overdue = now > dispute.deadline_decision;
            tracing::warn!(
                case_id = %dispute.case_id,
                deadline = %dispute.deadline_decision,
                overdue,
                "dispute awaiting moderation"
            );
            self.ctx
                .effects
                .track(
                    "dispute_moderation_reminder",
                    None,
                    Some("admin"),
                    serde_json::json!({
                        "caseId": dispute.case_id,
                        "deadlineDecision": dispute.deadline_decision,
                        "overdue": overdue,
                    }),
                )
                .await;
            report.reminded += 1;
        }
        Ok(report)
    }

    /// Read a dispute. Visible to both parties and admins.
    pub async fn get_dispute(
        &self,
        caller: Option<&Caller>,
        case_id: CaseId,
    ) -> Result<Dispute, EscrowError> {
        let caller = authenticated(caller)?;
        let dispute = self.load_dispute(case_id).await?;
        let is_party = dispute.is_party(&caller.uid, PartyRole::Customer)
            || dispute.is_party(&caller.uid, PartyRole::Pro);
        if !is_party && !self.ctx.admins.is_admin(caller).await? {
            return Err(EscrowError::denied("get_dispute", "not a party to this case"));
        }
        Ok(dispute)
    }

    async fn load_dispute(&self, case_id: CaseId) -> Result<Dispute, EscrowError> {
        self.ctx
            .ledger
            .get_dispute(&case_id)
            .await?
            .ok_or(EscrowError::DisputeNotFound(case_id))
    }

    async fn patch_job(&self, job_id: &JobId, patch: JobPatch) {
        match self.ctx.ledger.patch_job(job_id, patch).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(job_id = %job_id, "job missing; patch skipped"),
            Err(e) => tracing::error!(job_id = %job_id, error = %e, "job patch failed"),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

