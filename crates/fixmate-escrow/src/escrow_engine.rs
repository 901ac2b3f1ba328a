//! # Escrow Engine
//!
//! Owns the Payment lifecycle: intent creation, capture confirmation,
//! timed and manual release to the provider, refunds, and the processor
//! webhooks that confirm each step.
//!
//! ## Write ordering
//!
//! Every operation that moves money calls the processor first and writes
//! the ledger only after the processor confirmed. Each processor write
//! carries an idempotency key derived from local state, so a retried
//! operation cannot move money twice.
//!
//! ## Webhooks
//!
//! Handlers resolve their target by the processor's identifier and return
//! [`WebhookOutcome::Ignored`] when the record is unknown or already in the
//! target state. Duplicate deliveries are expected.

use std::sync::Arc;

use fixmate_core::{
    ChargeId, ConnectedAccountId, ErrorKind, JobId, Money, PaymentId, RefundId, TransferId, Uid,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::caller::{authenticated, Actor, Caller};
use crate::context::Collaborators;
use crate::error::EscrowError;
use crate::events::{ProcessorEvent, WebhookOutcome};
use crate::job::{JobPatch, JobStatus};
use crate::payment::{
    ConnectedAccount, Payment, PaymentStatus, Refund, RefundOrigin, Transfer, TransferStatus,
};
use crate::ports::{IntentRequest, LedgerTransaction, RefundRequest, TransferRequest};

// ── Inputs and Receipts ────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentInput {
    pub job_id: JobId,
    pub customer_uid: Uid,
    pub amount: Money,
    pub currency: String,
    #[serde(default)]
    pub connected_account_id: Option<ConnectedAccountId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentCreated {
    pub payment_id: PaymentId,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseReceipt {
    pub transfer_id: TransferId,
    pub amount_net: Money,
    pub platform_fee: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundReceipt {
    pub refund_id: RefundId,
    pub amount: Money,
    pub currency: String,
}

/// A payment with its child records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    #[serde(flatten)]
    pub payment: Payment,
    pub transfer: Option<Transfer>,
    pub refunds: Vec<Refund>,
}

/// Tally of one auto-release sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub released: usize,
    /// Due payments that were not releasable (frozen, refunded, raced).
    pub skipped: usize,
    pub failed: usize,
}

// ── Engine ─────────────────────────────────────────────────────────────

/// Payment escrow operations.
#[derive(Debug, Clone)]
pub struct EscrowEngine {
    ctx: Collaborators,
}

impl EscrowEngine {
    pub fn new(ctx: Collaborators) -> Self {
        Self { ctx }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.ctx
    }

    /// Create a processor payment intent and record a `Pending` payment.
    pub async fn create_payment_intent(
        &self,
        caller: Option<&Caller>,
        input: CreateIntentInput,
    ) -> Result<IntentCreated, EscrowError> {
        let caller = authenticated(caller)?;
        if input.job_id.is_empty() {
            return Err(EscrowError::InvalidArgument("jobId is required".into()));
        }
        if input.customer_uid.is_empty() {
            return Err(EscrowError::InvalidArgument("customerUid is required".into()));
        }
        let currency = normalize_currency(&input.currency)?;
        let minimum = self.ctx.policy.minimum_charge;
        if input.amount < minimum {
            return Err(EscrowError::AmountBelowMinimum {
                amount: input.amount.to_string(),
                minimum: minimum.to_string(),
            });
        }
        let maximum = self.ctx.policy.maximum_charge;
        if input.amount > maximum {
            return Err(EscrowError::AmountOutOfRange {
                requested: input.amount.to_string(),
                maximum: maximum.to_string(),
            });
        }
        let amount_minor = input.amount.to_minor_units()?;
        if caller.uid != input.customer_uid {
            return Err(EscrowError::denied(
                "create_payment_intent",
                "caller is not the paying customer",
            ));
        }

        let job = self
            .ctx
            .ledger
            .get_job(&input.job_id)
            .await?
            .ok_or_else(|| EscrowError::JobNotFound(input.job_id.clone()))?;
        if job.customer_uid != input.customer_uid {
            return Err(EscrowError::denied(
                "create_payment_intent",
                "job belongs to another customer",
            ));
        }

        let created = self
            .ctx
            .gateway
            .create_payment_intent(IntentRequest {
                amount_minor,
                currency: currency.clone(),
                job_id: job.id.clone(),
                customer_uid: input.customer_uid.clone(),
                connected_account_id: input.connected_account_id.clone(),
                idempotency_key: format!("intent:{}:{}:{}", job.id, input.customer_uid, amount_minor),
            })
            .await
            .map_err(|e| {
                tracing::error!(job_id = %job.id, error = %e, "payment intent creation failed");
                e
            })?;

        let now = self.ctx.clock.now();
        let payment = Payment::pending(
            created.id.clone(),
            job.id.clone(),
            input.customer_uid.clone(),
            input.amount,
            currency.clone(),
            input.connected_account_id,
            now,
        );
        if !self.ctx.ledger.insert_payment(payment).await? {
            tracing::info!(payment_id = %created.id, "payment intent already recorded");
        }
        tracing::info!(
            payment_id = %created.id,
            job_id = %job.id,
            amount = %input.amount,
            currency = %currency,
            "payment intent created"
        );

        self.ctx
            .effects
            .track(
                "payment_intent_created",
                Some(&input.customer_uid),
                Some("customer"),
                serde_json::json!({
                    "paymentId": created.id,
                    "jobId": job.id,
                    "amount": input.amount,
                    "currency": currency,
                }),
            )
            .await;

        Ok(IntentCreated {
            payment_id: created.id,
            client_secret: created.client_secret,
        })
    }

    /// `payment_intent.succeeded`: `Pending → Captured`, job → `assigned`.
    pub async fn handle_payment_intent_succeeded(
        &self,
        payment_id: &PaymentId,
        charge_id: Option<ChargeId>,
    ) -> Result<WebhookOutcome, EscrowError> {
        let Some(payment) = self.ctx.ledger.get_payment(payment_id).await? else {
            tracing::warn!(payment_id = %payment_id, "capture for unknown payment ignored");
            return Ok(WebhookOutcome::Ignored);
        };
        if payment.status != PaymentStatus::Pending {
            tracing::debug!(payment_id = %payment_id, status = %payment.status, "duplicate capture ignored");
            return Ok(WebhookOutcome::Ignored);
        }

        let now = self.ctx.clock.now();
        let hold = self.ctx.policy.escrow_hold;
        let tx = LedgerTransaction::new()
            .update_payment(payment_id.clone(), move |p| p.capture(charge_id, now, hold));
        match self.ctx.ledger.commit(tx).await {
            Ok(()) => {}
            Err(e) if e.is_stale_state() => {
                tracing::debug!(payment_id = %payment_id, "capture raced a duplicate delivery");
                return Ok(WebhookOutcome::Ignored);
            }
            Err(e) => return Err(e),
        }
        tracing::info!(payment_id = %payment_id, job_id = %payment.job_id, "payment captured");

        self.patch_job(
            &payment.job_id,
            JobPatch::payment(payment_id, PaymentStatus::Captured, now)
                .with_status(JobStatus::Assigned),
        )
        .await;

        self.ctx
            .effects
            .track(
                "payment_captured",
                Some(&payment.customer_uid),
                Some("customer"),
                serde_json::json!({
                    "paymentId": payment_id,
                    "jobId": payment.job_id,
                    "amount": payment.amount_gross,
                    "currency": payment.currency,
                }),
            )
            .await;
        Ok(WebhookOutcome::Applied)
    }

    /// Release the escrowed remainder to the provider's connected account.
    ///
    /// A manual release must come from the paying customer and ignores the
    /// hold. An automatic release must come from the scheduler (or an
    /// admin) and is only permitted once the hold has elapsed.
    pub async fn release_transfer(
        &self,
        actor: &Actor,
        payment_id: &PaymentId,
        manual_release: bool,
    ) -> Result<ReleaseReceipt, EscrowError> {
        let payment = self.load_payment(payment_id).await?;

        match (actor, manual_release) {
            (Actor::User(caller), true) if caller.uid == payment.customer_uid => {}
            (_, true) => {
                return Err(EscrowError::denied(
                    "release_transfer",
                    "manual release is reserved for the paying customer",
                ))
            }
            (Actor::System, false) => {}
            (Actor::User(caller), false) => {
                if !self.ctx.admins.is_admin(caller).await? {
                    return Err(EscrowError::denied(
                        "release_transfer",
                        "automatic release is reserved for the scheduler",
                    ));
                }
            }
        }

        let released_from = payment.check_releasable()?;
        let now = self.ctx.clock.now();
        if !manual_release {
            if let Some(hold_until) = payment.escrow_hold_until {
                if now < hold_until {
                    return Err(EscrowError::EscrowHoldActive {
                        payment_id: payment.id.clone(),
                        hold_until,
                    });
                }
            }
        }
        if let Some(active) = self.ctx.ledger.active_dispute_for_job(&payment.job_id).await? {
            return Err(EscrowError::FrozenByDispute {
                payment_id: payment.id.clone(),
                case_id: active.case_id,
            });
        }
        let destination = payment
            .connected_account_id
            .clone()
            .ok_or_else(|| EscrowError::MissingConnectedAccount(payment.id.clone()))?;
        if let Some(account) = self.ctx.ledger.get_connected_account(&destination).await? {
            if !account.payouts_enabled {
                return Err(EscrowError::PayoutsDisabled(payment.id.clone()));
            }
        }

        let fees = self.ctx.policy.fees.calculate(released_from);
        if !fees.amount_net.is_positive() {
            return Err(EscrowError::NothingToRelease(payment.id.clone()));
        }
        let pro_uid = self
            .ctx
            .ledger
            .get_job(&payment.job_id)
            .await?
            .and_then(|job| job.assigned_pro_uid)
            .or_else(|| payment.pro_uid.clone());

        let created = self
            .ctx
            .gateway
            .create_transfer(TransferRequest {
                amount_minor: fees.amount_net.to_minor_units()?,
                currency: payment.currency.clone(),
                destination: destination.clone(),
                source_charge: payment.charge_id.clone(),
                payment_id: payment.id.clone(),
                job_id: payment.job_id.clone(),
                idempotency_key: format!("transfer:{}", payment.id),
            })
            .await
            .map_err(|e| {
                tracing::error!(payment_id = %payment.id, error = %e, "transfer creation failed");
                e
            })?;

        let transfer = Transfer {
            id: created.id.clone(),
            payment_id: payment.id.clone(),
            job_id: payment.job_id.clone(),
            pro_uid: pro_uid.clone(),
            customer_uid: payment.customer_uid.clone(),
            destination,
            amount_net: fees.amount_net,
            platform_fee: fees.platform_fee,
            currency: payment.currency.clone(),
            manual_release,
            status: TransferStatus::Pending,
            created_at: now,
            completed_at: None,
        };
        let transfer_id = created.id.clone();
        let pro_for_payment = pro_uid.clone();
        let tx = LedgerTransaction::new()
            .update_payment(payment.id.clone(), move |p| {
                p.mark_transferred(transfer_id, released_from, fees, pro_for_payment, now)
            })
            .put_transfer(transfer);
        self.ctx.ledger.commit(tx).await.map_err(|e| {
            tracing::error!(
                payment_id = %payment.id,
                transfer_id = %created.id,
                error = %e,
                "transfer issued but ledger commit failed"
            );
            e
        })?;
        tracing::info!(
            payment_id = %payment.id,
            transfer_id = %created.id,
            amount_net = %fees.amount_net,
            platform_fee = %fees.platform_fee,
            manual_release,
            actor = actor.label(),
            "escrow released"
        );

        self.patch_job(
            &payment.job_id,
            JobPatch::payment(&payment.id, PaymentStatus::Transferred, now),
        )
        .await;

        if let Some(pro) = &pro_uid {
            self.ctx
                .effects
                .notify(
                    pro,
                    "Payment released",
                    &format!(
                        "{} {} is on its way to your account.",
                        fees.amount_net,
                        payment.currency.to_uppercase()
                    ),
                    [
                        ("type", "payment_released".to_string()),
                        ("paymentId", payment.id.to_string()),
                        ("jobId", payment.job_id.to_string()),
                    ],
                )
                .await;
        }
        self.ctx
            .effects
            .track(
                "transfer_initiated",
                actor.caller().map(|c| &c.uid),
                None,
                serde_json::json!({
                    "paymentId": payment.id,
                    "transferId": created.id,
                    "amountNet": fees.amount_net,
                    "platformFee": fees.platform_fee,
                    "manualRelease": manual_release,
                }),
            )
            .await;

        Ok(ReleaseReceipt {
            transfer_id: created.id,
            amount_net: fees.amount_net,
            platform_fee: fees.platform_fee,
        })
    }

    /// Refund part or all of the refundable remainder.
    ///
    /// Allowed for the paying customer or an admin. The payment's status is
    /// unchanged; the processor's `charge.refunded` webhook later confirms
    /// the cumulative total.
    pub async fn partial_refund(
        &self,
        caller: Option<&Caller>,
        payment_id: &PaymentId,
        amount: Money,
        reason: Option<String>,
    ) -> Result<RefundReceipt, EscrowError> {
        let caller = authenticated(caller)?;
        let payment = self.load_payment(payment_id).await?;

        let is_customer = caller.uid == payment.customer_uid;
        if !is_customer && !self.ctx.admins.is_admin(caller).await? {
            return Err(EscrowError::denied(
                "partial_refund",
                "only the paying customer or an admin may refund",
            ));
        }
        payment.check_refundable(amount)?;

        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let expected_count = payment.refund_count;
        let created = self
            .ctx
            .gateway
            .create_refund(RefundRequest {
                payment_id: payment.id.clone(),
                amount_minor: amount.to_minor_units()?,
                reason: reason.clone(),
                idempotency_key: format!("refund:{}:{}", payment.id, expected_count + 1),
            })
            .await
            .map_err(|e| {
                tracing::error!(payment_id = %payment.id, error = %e, "refund creation failed");
                e
            })?;

        let now = self.ctx.clock.now();
        let refund = Refund {
            id: created.id.clone(),
            payment_id: payment.id.clone(),
            amount,
            currency: payment.currency.clone(),
            reason,
            origin: if is_customer {
                RefundOrigin::Customer
            } else {
                RefundOrigin::Admin
            },
            requested_by: caller.uid.clone(),
            created_at: now,
        };
        let tx = LedgerTransaction::new()
            .update_payment(payment.id.clone(), move |p| {
                p.record_refund_issued(amount, expected_count, now)
            })
            .put_refund(refund);
        self.ctx.ledger.commit(tx).await.map_err(|e| {
            tracing::error!(
                payment_id = %payment.id,
                refund_id = %created.id,
                error = %e,
                "refund issued but ledger commit failed"
            );
            e
        })?;
        tracing::info!(payment_id = %payment.id, refund_id = %created.id, amount = %amount, "refund issued");

        self.ctx
            .effects
            .track(
                "refund_requested",
                Some(&caller.uid),
                Some(if is_customer { "customer" } else { "admin" }),
                serde_json::json!({
                    "paymentId": payment.id,
                    "refundId": created.id,
                    "amount": amount,
                }),
            )
            .await;

        Ok(RefundReceipt {
            refund_id: created.id,
            amount,
            currency: payment.currency,
        })
    }

    /// `transfer.created`: `Pending → Completed` on the Transfer record.
    pub async fn handle_transfer_created(
        &self,
        transfer_id: &TransferId,
    ) -> Result<WebhookOutcome, EscrowError> {
        let Some(transfer) = self.ctx.ledger.get_transfer(transfer_id).await? else {
            tracing::warn!(transfer_id = %transfer_id, "confirmation for unknown transfer ignored");
            return Ok(WebhookOutcome::Ignored);
        };
        if transfer.status == TransferStatus::Completed {
            return Ok(WebhookOutcome::Ignored);
        }

        let now = self.ctx.clock.now();
        let id = transfer_id.clone();
        let tx = LedgerTransaction::new().update_transfer(transfer_id.clone(), move |t| {
            if t.complete(now) {
                Ok(())
            } else {
                Err(EscrowError::ConcurrentModification {
                    record: format!("transfer {id}"),
                    reason: "already completed".to_string(),
                })
            }
        });
        match self.ctx.ledger.commit(tx).await {
            Ok(()) => {}
            Err(e) if e.is_stale_state() => return Ok(WebhookOutcome::Ignored),
            Err(e) => return Err(e),
        }
        tracing::info!(transfer_id = %transfer_id, payment_id = %transfer.payment_id, "transfer completed");

        self.ctx
            .effects
            .track(
                "payment_released",
                transfer.pro_uid.as_ref(),
                Some("pro"),
                serde_json::json!({
                    "paymentId": transfer.payment_id,
                    "transferId": transfer.id,
                    "jobId": transfer.job_id,
                    "amountNet": transfer.amount_net,
                    "platformFee": transfer.platform_fee,
                }),
            )
            .await;
        Ok(WebhookOutcome::Applied)
    }

    /// `charge.refunded`: adopt the processor's cumulative refunded total.
    pub async fn handle_charge_refunded(
        &self,
        charge_id: &ChargeId,
        payment_id: Option<&PaymentId>,
        amount_refunded_minor: i64,
    ) -> Result<WebhookOutcome, EscrowError> {
        let mut found = self.ctx.ledger.find_payment_by_charge(charge_id).await?;
        if found.is_none() {
            if let Some(pid) = payment_id {
                found = self.ctx.ledger.get_payment(pid).await?;
            }
        }
        let Some(payment) = found else {
            tracing::warn!(charge_id = %charge_id, "refund for unknown charge ignored");
            return Ok(WebhookOutcome::Ignored);
        };

        let reported = Money::from_minor_units(amount_refunded_minor);
        if reported.min(payment.amount_gross) <= payment.total_refunded {
            tracing::debug!(payment_id = %payment.id, "refund total unchanged");
            return Ok(WebhookOutcome::Ignored);
        }

        let now = self.ctx.clock.now();
        let delta = Arc::new(Mutex::new(Money::ZERO));
        let delta_out = Arc::clone(&delta);
        let tx = LedgerTransaction::new().update_payment(payment.id.clone(), move |p| {
            *delta_out.lock() = p.apply_refund_total(reported, now)?;
            Ok(())
        });
        match self.ctx.ledger.commit(tx).await {
            Ok(()) => {}
            Err(e) if e.is_stale_state() => return Ok(WebhookOutcome::Ignored),
            Err(e) => return Err(e),
        }
        let delta = *delta.lock();
        tracing::info!(payment_id = %payment.id, charge_id = %charge_id, delta = %delta, "refund total updated");

        self.ctx
            .effects
            .track(
                "payment_refunded",
                Some(&payment.customer_uid),
                Some("customer"),
                serde_json::json!({
                    "paymentId": payment.id,
                    "chargeId": charge_id,
                    "amount": delta,
                    "totalRefunded": reported.min(payment.amount_gross),
                }),
            )
            .await;
        Ok(WebhookOutcome::Applied)
    }

    /// `account.updated`: store the provider account's capability flags.
    pub async fn handle_account_updated(
        &self,
        account_id: &ConnectedAccountId,
        charges_enabled: bool,
        payouts_enabled: bool,
    ) -> Result<WebhookOutcome, EscrowError> {
        if let Some(existing) = self.ctx.ledger.get_connected_account(account_id).await? {
            if existing.charges_enabled == charges_enabled
                && existing.payouts_enabled == payouts_enabled
            {
                return Ok(WebhookOutcome::Ignored);
            }
        }
        self.ctx
            .ledger
            .upsert_connected_account(ConnectedAccount {
                id: account_id.clone(),
                charges_enabled,
                payouts_enabled,
                updated_at: self.ctx.clock.now(),
            })
            .await?;
        tracing::info!(account_id = %account_id, charges_enabled, payouts_enabled, "connected account updated");
        Ok(WebhookOutcome::Applied)
    }

    /// Route a decoded event to its handler.
    pub async fn handle_event(&self, event: ProcessorEvent) -> Result<WebhookOutcome, EscrowError> {
        tracing::info!(event_id = event.event_id(), event_type = event.event_type(), "processor event");
        match event {
            ProcessorEvent::PaymentIntentSucceeded {
                payment_id,
                charge_id,
                ..
            } => {
                self.handle_payment_intent_succeeded(&payment_id, charge_id)
                    .await
            }
            ProcessorEvent::TransferCreated { transfer_id, .. } => {
                self.handle_transfer_created(&transfer_id).await
            }
            ProcessorEvent::ChargeRefunded {
                charge_id,
                payment_id,
                amount_refunded_minor,
                ..
            } => {
                self.handle_charge_refunded(&charge_id, payment_id.as_ref(), amount_refunded_minor)
                    .await
            }
            ProcessorEvent::AccountUpdated {
                account_id,
                charges_enabled,
                payouts_enabled,
                ..
            } => {
                self.handle_account_updated(&account_id, charges_enabled, payouts_enabled)
                    .await
            }
            ProcessorEvent::Unknown { event_type, .. } => {
                tracing::info!(event_type = %event_type, "unhandled event type ignored");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    /// Verify, decode and dispatch a raw webhook delivery.
    pub async fn receive_webhook(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookOutcome, EscrowError> {
        let header = signature_header.unwrap_or_default();
        if let Err(e) =
            self.ctx
                .gateway
                .verify_webhook_signature(payload, header, self.ctx.clock.now())
        {
            tracing::warn!(error = %e, "webhook signature rejected");
            return Err(e.into());
        }
        let event = self.ctx.gateway.parse_event(payload)?;
        self.handle_event(event).await
    }

    /// Release every captured payment whose hold has elapsed.
    ///
    /// Per-payment failures are counted and logged; they never abort the
    /// sweep.
    pub async fn release_due_payments(&self) -> Result<SweepReport, EscrowError> {
        let now = self.ctx.clock.now();
        let due = self.ctx.ledger.list_releasable(now).await?;
        let mut report = SweepReport::default();

        for payment in due {
            match self.release_transfer(&Actor::System, &payment.id, false).await {
                Ok(_) => report.released += 1,
                Err(e) if e.kind() == ErrorKind::FailedPrecondition => {
                    tracing::debug!(payment_id = %payment.id, reason = %e, "due payment skipped");
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(payment_id = %payment.id, error = %e, "auto-release failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            released = report.released,
            skipped = report.skipped,
            failed = report.failed,
            "escrow auto-release sweep finished"
        );
        Ok(report)
    }

    /// Read a payment with its transfer and refunds. Visible to the paying
    /// customer, the provider, and admins.
    pub async fn get_payment(
        &self,
        caller: Option<&Caller>,
        payment_id: &PaymentId,
    ) -> Result<PaymentDetails, EscrowError> {
        let caller = authenticated(caller)?;
        let payment = self.load_payment(payment_id).await?;

        let mut allowed = caller.uid == payment.customer_uid
            || payment.pro_uid.as_ref() == Some(&caller.uid);
        if !allowed {
            allowed = self
                .ctx
                .ledger
                .get_job(&payment.job_id)
                .await?
                .and_then(|j| j.assigned_pro_uid)
                .is_some_and(|pro| pro == caller.uid);
        }
        if !allowed && !self.ctx.admins.is_admin(caller).await? {
            return Err(EscrowError::denied("get_payment", "not a party to this payment"));
        }

        let transfer = match &payment.transfer_id {
            Some(id) => self.ctx.ledger.get_transfer(id).await?,
            None => None,
        };
        let refunds = self.ctx.ledger.list_refunds(&payment.id).await?;
        Ok(PaymentDetails {
            payment,
            transfer,
            refunds,
        })
    }

    async fn load_payment(&self, id: &PaymentId) -> Result<Payment, EscrowError> {
        self.ctx
            .ledger
            .get_payment(id)
            .await?
            .ok_or_else(|| EscrowError::PaymentNotFound(id.clone()))
    }

    /// Job writes follow a committed transition and are logged on failure.
    async fn patch_job(&self, job_id: &JobId, patch: JobPatch) {
        match self.ctx.ledger.patch_job(job_id, patch).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(job_id = %job_id, "job missing; patch skipped"),
            Err(e) => tracing::error!(job_id = %job_id, error = %e, "job patch failed"),
        }
    }
}

/// Lower-case three-letter ISO 4217 code.
fn normalize_currency(raw: &str) -> Result<String, EscrowError> {
    let code = raw.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_lowercase())
    } else {
        Err(EscrowError::InvalidArgument(format!(
            "currency must be a three-letter ISO code, got {raw:?}"
        )))
    }
}
