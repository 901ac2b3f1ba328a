//! # Payments, Transfers and Refunds
//!
//! The Payment aggregate holds one customer charge in escrow for a job.
//! Transfers and refunds are child records referencing it by id.
//!
//! ## Status machine
//!
//! ```text
//! Pending ──capture──▶ Captured ──release──▶ Transferred
//!                          │
//!                          └──dispute refund──▶ Refunded
//! ```
//!
//! Refund amounts accumulate independently of status: a partial refund
//! leaves a `Captured` payment `Captured`. Two running totals exist:
//! `refunds_issued` (sum of Refund records this service created) and
//! `total_refunded` (cumulative amount reported by the processor). The
//! refundable remainder is computed against the larger of the two, so the
//! sum of Refund amounts never exceeds `amount_gross`.

use fixmate_core::{
    CaseId, ChargeId, ConnectedAccountId, JobId, Money, PaymentId, RefundId, Timestamp,
    TransferId, Uid,
};
use serde::{Deserialize, Serialize};

use crate::error::EscrowError;
use crate::policy::FeeBreakdown;

// ── Payment Status ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Intent created, awaiting processor confirmation.
    Pending,
    /// Funds captured and held by the platform.
    Captured,
    /// Escrow released to the provider. Terminal for release.
    Transferred,
    /// Refunded through dispute resolution (partially or fully).
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Captured => "captured",
            Self::Transferred => "transferred",
            Self::Refunded => "refunded",
        }
    }

    /// Whether a refund may be issued from this status.
    pub fn is_refundable(&self) -> bool {
        matches!(self, Self::Captured | Self::Refunded)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Payment ────────────────────────────────────────────────────────────

/// One customer charge held in escrow for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Processor-assigned payment intent id.
    pub id: PaymentId,
    pub job_id: JobId,
    pub customer_uid: Uid,
    /// Set once the job's provider is known (at release).
    pub pro_uid: Option<Uid>,
    pub connected_account_id: Option<ConnectedAccountId>,
    pub amount_gross: Money,
    /// Lower-case ISO 4217 code.
    pub currency: String,
    pub status: PaymentStatus,
    pub escrow_hold_until: Option<Timestamp>,
    pub charge_id: Option<ChargeId>,
    pub transfer_id: Option<TransferId>,
    pub platform_fee: Option<Money>,
    pub amount_net: Option<Money>,
    /// Cumulative refunded amount reported by the processor.
    pub total_refunded: Money,
    /// Sum of Refund records created by this service.
    pub refunds_issued: Money,
    pub refund_count: u32,
    pub created_at: Timestamp,
    pub captured_at: Option<Timestamp>,
    pub transferred_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl Payment {
    /// A freshly requested payment in `Pending` status.
    pub fn pending(
        id: PaymentId,
        job_id: JobId,
        customer_uid: Uid,
        amount_gross: Money,
        currency: String,
        connected_account_id: Option<ConnectedAccountId>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            job_id,
            customer_uid,
            pro_uid: None,
            connected_account_id,
            amount_gross,
            currency,
            status: PaymentStatus::Pending,
            escrow_hold_until: None,
            charge_id: None,
            transfer_id: None,
            platform_fee: None,
            amount_net: None,
            total_refunded: Money::ZERO,
            refunds_issued: Money::ZERO,
            refund_count: 0,
            created_at: now,
            captured_at: None,
            transferred_at: None,
            updated_at: now,
        }
    }

    fn require_status(
        &self,
        allowed: &[PaymentStatus],
        operation: &'static str,
    ) -> Result<(), EscrowError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(EscrowError::InvalidPaymentState {
                payment_id: self.id.clone(),
                operation,
                status: self.status.as_str().to_string(),
            })
        }
    }

    /// The larger of locally issued and processor-reported refunds.
    pub fn refunded_so_far(&self) -> Money {
        self.total_refunded.max(self.refunds_issued)
    }

    /// Amount that can still be refunded or released.
    pub fn remaining(&self) -> Money {
        self.amount_gross.saturating_sub(self.refunded_so_far())
    }

    /// Confirm capture. Transitions `Pending → Captured` and starts the hold.
    pub fn capture(
        &mut self,
        charge_id: Option<ChargeId>,
        now: Timestamp,
        hold: chrono::Duration,
    ) -> Result<(), EscrowError> {
        self.require_status(&[PaymentStatus::Pending], "capture")?;
        self.status = PaymentStatus::Captured;
        self.charge_id = charge_id;
        self.captured_at = Some(now);
        self.escrow_hold_until = Some(now.plus(hold));
        self.updated_at = now;
        Ok(())
    }

    /// Check every precondition of a release that depends only on this
    /// record. Callers check the clock, disputes and account separately.
    pub fn check_releasable(&self) -> Result<Money, EscrowError> {
        self.require_status(&[PaymentStatus::Captured], "release")?;
        if self.connected_account_id.is_none() {
            return Err(EscrowError::MissingConnectedAccount(self.id.clone()));
        }
        let remaining = self.remaining();
        if !remaining.is_positive() {
            return Err(EscrowError::NothingToRelease(self.id.clone()));
        }
        Ok(remaining)
    }

    /// Record the completed release. Transitions `Captured → Transferred`.
    ///
    /// `released_from` is the remainder the fee was computed on; the call
    /// fails if refunds landed in between.
    pub fn mark_transferred(
        &mut self,
        transfer_id: TransferId,
        released_from: Money,
        fees: FeeBreakdown,
        pro_uid: Option<Uid>,
        now: Timestamp,
    ) -> Result<(), EscrowError> {
        let remaining = self.check_releasable()?;
        if remaining != released_from {
            return Err(EscrowError::ConcurrentModification {
                record: format!("payment {}", self.id),
                reason: format!("releasable amount changed from {released_from} to {remaining}"),
            });
        }
        self.status = PaymentStatus::Transferred;
        self.transfer_id = Some(transfer_id);
        self.platform_fee = Some(fees.platform_fee);
        self.amount_net = Some(fees.amount_net);
        if pro_uid.is_some() {
            self.pro_uid = pro_uid;
        }
        self.transferred_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Validate a refund request against the current state.
    pub fn check_refundable(&self, amount: Money) -> Result<(), EscrowError> {
        self.require_status(&[PaymentStatus::Captured, PaymentStatus::Refunded], "refund")?;
        let maximum = self.remaining();
        if !amount.is_positive() || amount > maximum {
            return Err(EscrowError::AmountOutOfRange {
                requested: amount.to_string(),
                maximum: maximum.to_string(),
            });
        }
        Ok(())
    }

    /// Account for a refund this service issued.
    ///
    /// `expected_count` is the refund count observed before the processor
    /// call; a mismatch means another refund committed in between.
    pub fn record_refund_issued(
        &mut self,
        amount: Money,
        expected_count: u32,
        now: Timestamp,
    ) -> Result<(), EscrowError> {
        if self.refund_count != expected_count {
            return Err(EscrowError::ConcurrentModification {
                record: format!("payment {}", self.id),
                reason: "another refund was recorded first".to_string(),
            });
        }
        self.check_refundable(amount)?;
        self.refunds_issued += amount;
        self.refund_count += 1;
        self.updated_at = now;
        Ok(())
    }

    /// Mark the payment refunded after a dispute decision.
    pub fn mark_refunded(&mut self, now: Timestamp) -> Result<(), EscrowError> {
        self.require_status(
            &[PaymentStatus::Captured, PaymentStatus::Refunded],
            "mark_refunded",
        )?;
        self.status = PaymentStatus::Refunded;
        self.updated_at = now;
        Ok(())
    }

    /// Apply the processor's cumulative refunded amount.
    ///
    /// Returns the delta. The total never decreases and is capped at
    /// `amount_gross`.
    pub fn apply_refund_total(&mut self, reported: Money, now: Timestamp) -> Result<Money, EscrowError> {
        let capped = reported.min(self.amount_gross);
        if capped <= self.total_refunded {
            return Err(EscrowError::ConcurrentModification {
                record: format!("payment {}", self.id),
                reason: format!(
                    "reported total {capped} does not exceed recorded {}",
                    self.total_refunded
                ),
            });
        }
        let delta = capped - self.total_refunded;
        self.total_refunded = capped;
        self.updated_at = now;
        Ok(delta)
    }
}

// ── Transfer ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Completed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

/// Funds moved from the platform to a provider's connected account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: TransferId,
    pub payment_id: PaymentId,
    pub job_id: JobId,
    pub pro_uid: Option<Uid>,
    pub customer_uid: Uid,
    pub destination: ConnectedAccountId,
    pub amount_net: Money,
    pub platform_fee: Money,
    pub currency: String,
    pub manual_release: bool,
    pub status: TransferStatus,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Transfer {
    /// Confirm the transfer. Returns `false` if it was already completed.
    pub fn complete(&mut self, now: Timestamp) -> bool {
        if self.status == TransferStatus::Completed {
            return false;
        }
        self.status = TransferStatus::Completed;
        self.completed_at = Some(now);
        true
    }
}

// ── Refund ─────────────────────────────────────────────────────────────

/// Who initiated a refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RefundOrigin {
    Customer,
    Admin,
    Dispute { case_id: CaseId },
}

/// A partial or full refund against a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub id: RefundId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub currency: String,
    pub reason: Option<String>,
    pub origin: RefundOrigin,
    pub requested_by: Uid,
    pub created_at: Timestamp,
}

// ── Connected Account ──────────────────────────────────────────────────

/// Capability flags of a provider's processor account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedAccount {
    pub id: ConnectedAccountId,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub updated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn t0() -> Timestamp {
        Timestamp::from_epoch_secs(1_767_000_000).unwrap()
    }

    fn pending(gross: Money) -> Payment {
        Payment::pending(
            PaymentId::new("pi_1"),
            JobId::new("job-1"),
            Uid::new("cust-1"),
            gross,
            "eur".to_string(),
            Some(ConnectedAccountId::new("acct_1")),
            t0(),
        )
    }

    fn fees(net: rust_decimal::Decimal, fee: rust_decimal::Decimal) -> FeeBreakdown {
        FeeBreakdown {
            platform_fee: Money::new(fee),
            amount_net: Money::new(net),
        }
    }

    #[test]
    fn capture_sets_hold() {
        let mut p = pending(Money::new(dec!(100)));
        p.capture(Some(ChargeId::new("ch_1")), t0(), Duration::days(7)).unwrap();
        assert_eq!(p.status, PaymentStatus::Captured);
        assert_eq!(p.escrow_hold_until, Some(t0().plus(Duration::days(7))));
        assert!(p.capture(None, t0(), Duration::days(7)).is_err());
    }

    #[test]
    fn release_requires_captured() {
        let p = pending(Money::new(dec!(100)));
        let err = p.check_releasable().unwrap_err();
        assert!(matches!(err, EscrowError::InvalidPaymentState { .. }));
    }

    #[test]
    fn release_requires_connected_account() {
        let mut p = pending(Money::new(dec!(100)));
        p.connected_account_id = None;
        p.capture(None, t0(), Duration::days(7)).unwrap();
        assert!(matches!(
            p.check_releasable(),
            Err(EscrowError::MissingConnectedAccount(_))
        ));
    }

    #[test]
    fn release_after_partial_refund_uses_remainder() {
        let mut p = pending(Money::new(dec!(100)));
        p.capture(None, t0(), Duration::days(7)).unwrap();
        p.record_refund_issued(Money::new(dec!(30)), 0, t0()).unwrap();
        assert_eq!(p.check_releasable().unwrap(), Money::new(dec!(70)));
        p.mark_transferred(
            TransferId::new("tr_1"),
            Money::new(dec!(70)),
            fees(dec!(63), dec!(7)),
            Some(Uid::new("pro-1")),
            t0(),
        )
        .unwrap();
        assert_eq!(p.status, PaymentStatus::Transferred);
        assert_eq!(p.pro_uid, Some(Uid::new("pro-1")));
    }

    #[test]
    fn fully_refunded_payment_cannot_be_released() {
        let mut p = pending(Money::new(dec!(100)));
        p.capture(None, t0(), Duration::days(7)).unwrap();
        p.apply_refund_total(Money::new(dec!(100)), t0()).unwrap();
        assert!(matches!(
            p.check_releasable(),
            Err(EscrowError::NothingToRelease(_))
        ));
    }

    #[test]
    fn mark_transferred_detects_refund_race() {
        let mut p = pending(Money::new(dec!(100)));
        p.capture(None, t0(), Duration::days(7)).unwrap();
        let observed = p.check_releasable().unwrap();
        p.record_refund_issued(Money::new(dec!(10)), 0, t0()).unwrap();
        let err = p
            .mark_transferred(TransferId::new("tr_1"), observed, fees(dec!(90), dec!(10)), None, t0())
            .unwrap_err();
        assert!(matches!(err, EscrowError::ConcurrentModification { .. }));
    }

    #[test]
    fn refund_range_is_checked_against_remainder() {
        let mut p = pending(Money::new(dec!(100)));
        p.capture(None, t0(), Duration::days(7)).unwrap();
        assert!(p.check_refundable(Money::new(dec!(150))).is_err());
        assert!(p.check_refundable(Money::ZERO).is_err());
        p.record_refund_issued(Money::new(dec!(60)), 0, t0()).unwrap();
        assert!(p.check_refundable(Money::new(dec!(40))).is_ok());
        assert!(p.check_refundable(Money::new(dec!(40.01))).is_err());
    }

    #[test]
    fn stale_refund_count_is_rejected() {
        let mut p = pending(Money::new(dec!(100)));
        p.capture(None, t0(), Duration::days(7)).unwrap();
        p.record_refund_issued(Money::new(dec!(10)), 0, t0()).unwrap();
        assert!(p.record_refund_issued(Money::new(dec!(10)), 0, t0()).is_err());
    }

    #[test]
    fn refund_total_is_monotonic_and_capped() {
        let mut p = pending(Money::new(dec!(100)));
        p.capture(None, t0(), Duration::days(7)).unwrap();
        let delta = p.apply_refund_total(Money::new(dec!(25)), t0()).unwrap();
        assert_eq!(delta, Money::new(dec!(25)));
        assert!(p.apply_refund_total(Money::new(dec!(25)), t0()).is_err());
        let delta = p.apply_refund_total(Money::new(dec!(500)), t0()).unwrap();
        assert_eq!(delta, Money::new(dec!(75)));
        assert_eq!(p.total_refunded, p.amount_gross);
    }

    #[test]
    fn transfer_completes_once() {
        let mut t = Transfer {
            id: TransferId::new("tr_1"),
            payment_id: PaymentId::new("pi_1"),
            job_id: JobId::new("job-1"),
            pro_uid: None,
            customer_uid: Uid::new("cust-1"),
            destination: ConnectedAccountId::new("acct_1"),
            amount_net: Money::new(dec!(90)),
            platform_fee: Money::new(dec!(10)),
            currency: "eur".into(),
            manual_release: false,
            status: TransferStatus::Pending,
            created_at: t0(),
            completed_at: None,
        };
        assert!(t.complete(t0()));
        assert!(!t.complete(t0()));
        assert_eq!(t.completed_at, Some(t0()));
    }

    #[test]
    fn payment_serializes_camel_case() {
        let p = pending(Money::new(dec!(12.5)));
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["amountGross"], "12.50");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["customerUid"], "cust-1");
    }
}
