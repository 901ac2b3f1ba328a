//! # Escrow Error Types
//!
//! Structured error hierarchy for the escrow and dispute engines.
//! State machine rejections carry the record id, the attempted operation,
//! and the status at the time of failure. Every variant maps onto a stable
//! [`ErrorKind`] through [`EscrowError::kind`].

use fixmate_core::{CaseId, ErrorKind, JobId, MoneyError, PaymentId, Timestamp, TransferId};
use thiserror::Error;

/// Errors arising from escrow and dispute operations.
#[derive(Error, Debug)]
pub enum EscrowError {
    /// No caller identity.
    #[error("authentication required")]
    Unauthenticated,

    /// Caller is authenticated but not allowed to perform the action.
    #[error("permission denied for {action}: {reason}")]
    PermissionDenied {
        /// The operation attempted.
        action: &'static str,
        /// Why the caller was rejected.
        reason: String,
    },

    /// Malformed or missing input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Charge amount under the configured minimum.
    #[error("amount {amount} is below the minimum charge of {minimum}")]
    AmountBelowMinimum {
        amount: String,
        minimum: String,
    },

    /// Refund or dispute amount outside the permitted range.
    #[error("amount {requested} must be greater than 0 and at most {maximum}")]
    AmountOutOfRange {
        requested: String,
        maximum: String,
    },

    #[error("payment {0} not found")]
    PaymentNotFound(PaymentId),

    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("dispute {0} not found")]
    DisputeNotFound(CaseId),

    #[error("transfer {0} not found")]
    TransferNotFound(TransferId),

    /// Payment status does not permit the operation.
    #[error("payment {payment_id} cannot perform {operation} in status {status}")]
    InvalidPaymentState {
        payment_id: PaymentId,
        operation: &'static str,
        status: String,
    },

    /// Dispute status does not permit the transition.
    #[error("dispute {case_id} cannot move from {from} to {to}: {reason}")]
    InvalidDisputeTransition {
        case_id: CaseId,
        from: String,
        to: String,
        reason: String,
    },

    /// Release attempted before the escrow hold elapsed.
    #[error("escrow for payment {payment_id} is held until {hold_until}")]
    EscrowHoldActive {
        payment_id: PaymentId,
        hold_until: Timestamp,
    },

    /// Release attempted with no destination account on record.
    #[error("payment {0} has no connected account")]
    MissingConnectedAccount(PaymentId),

    /// Destination account cannot receive payouts.
    #[error("connected account for payment {0} has payouts disabled")]
    PayoutsDisabled(PaymentId),

    /// Release attempted while a dispute on the job is unresolved.
    #[error("payment {payment_id} is frozen by active dispute {case_id}")]
    FrozenByDispute {
        payment_id: PaymentId,
        case_id: CaseId,
    },

    /// Nothing left to transfer after refunds.
    #[error("payment {0} has no remaining balance to release")]
    NothingToRelease(PaymentId),

    /// A full refund was requested after the payment was already refunded
    /// in full.
    #[error("payment {0} has nothing left to refund")]
    NothingToRefund(PaymentId),

    /// The record changed between read and commit.
    #[error("{record} changed concurrently: {reason}")]
    ConcurrentModification {
        record: String,
        reason: String,
    },

    /// An unresolved dispute already exists on the job.
    #[error("job {job_id} already has active dispute {case_id}")]
    DisputeAlreadyActive { job_id: JobId, case_id: CaseId },

    /// Dispute window after capture has elapsed.
    #[error("dispute window for payment {payment_id} closed at {deadline}")]
    DisputeWindowClosed {
        payment_id: PaymentId,
        deadline: Timestamp,
    },

    /// Webhook signature missing, malformed, stale, or wrong.
    #[error("webhook rejected: {0}")]
    WebhookRejected(#[from] SignatureError),

    /// Webhook payload could not be decoded.
    #[error("malformed webhook payload: {0}")]
    MalformedEvent(String),

    #[error("money: {0}")]
    Money(#[from] MoneyError),

    /// Payment processor call failed.
    #[error("payment gateway: {0}")]
    Gateway(#[from] GatewayError),

    /// Ledger store failed.
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    /// Admin authorization predicate failed to answer.
    #[error("authorizer: {0}")]
    Authorizer(String),
}

impl EscrowError {
    /// The stable kind surfaced to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated | Self::WebhookRejected(_) => ErrorKind::Unauthenticated,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::InvalidArgument(_)
            | Self::AmountBelowMinimum { .. }
            | Self::AmountOutOfRange { .. }
            | Self::MalformedEvent(_) => ErrorKind::InvalidArgument,
            Self::Money(e) => e.kind(),
            Self::PaymentNotFound(_)
            | Self::JobNotFound(_)
            | Self::DisputeNotFound(_)
            | Self::TransferNotFound(_) => ErrorKind::NotFound,
            Self::InvalidPaymentState { .. }
            | Self::InvalidDisputeTransition { .. }
            | Self::EscrowHoldActive { .. }
            | Self::MissingConnectedAccount(_)
            | Self::PayoutsDisabled(_)
            | Self::FrozenByDispute { .. }
            | Self::NothingToRelease(_)
            | Self::NothingToRefund(_)
            | Self::ConcurrentModification { .. } => ErrorKind::FailedPrecondition,
            Self::DisputeAlreadyActive { .. } => ErrorKind::AlreadyExists,
            Self::DisputeWindowClosed { .. } => ErrorKind::DeadlineExceeded,
            Self::Gateway(e) => e.kind(),
            Self::Ledger(e) => e.kind(),
            Self::Authorizer(_) => ErrorKind::Internal,
        }
    }

    /// Whether the error reports state that moved on since it was read.
    /// Webhook handlers treat these as duplicate deliveries.
    pub fn is_stale_state(&self) -> bool {
        matches!(
            self,
            Self::InvalidPaymentState { .. }
                | Self::InvalidDisputeTransition { .. }
                | Self::ConcurrentModification { .. }
        )
    }

    pub(crate) fn denied(action: &'static str, reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            action,
            reason: reason.into(),
        }
    }
}

/// Errors from the payment processor.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Network failure or timeout reaching the processor.
    #[error("transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// Processor answered with a non-2xx status.
    #[error("processor {endpoint} returned {status}: {body}")]
    Rejected {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Processor response could not be decoded.
    #[error("failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Unavailable,
            Self::Rejected { status, .. } if *status == 429 || *status >= 500 => {
                ErrorKind::Unavailable
            }
            Self::Rejected { .. } | Self::Decode { .. } => ErrorKind::Internal,
        }
    }
}

/// Errors from the ledger store.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    /// Store unreachable.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Query or write failed.
    #[error("ledger backend error: {0}")]
    Backend(String),

    /// A stored document could not be decoded.
    #[error("corrupt ledger document {key}: {message}")]
    Corrupt { key: String, message: String },
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Backend(_) | Self::Corrupt { .. } => ErrorKind::Internal,
        }
    }
}

/// Reasons a webhook signature was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header missing")]
    MissingHeader,
    #[error("signature header malformed")]
    Malformed,
    #[error("timestamp {timestamp} outside tolerance of {tolerance_secs}s")]
    OutsideTolerance { timestamp: i64, tolerance_secs: i64 },
    #[error("no matching signature")]
    Mismatch,
}

/// Errors from notification and analytics sinks. Never surfaced to callers.
#[derive(Error, Debug, Clone)]
#[error("sink {sink} failed: {message}")]
pub struct SinkError {
    pub sink: &'static str,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_errors_are_failed_precondition() {
        let err = EscrowError::InvalidPaymentState {
            payment_id: PaymentId::new("pi_1"),
            operation: "release",
            status: "pending".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
        let msg = err.to_string();
        assert!(msg.contains("pi_1"));
        assert!(msg.contains("pending"));
    }

    #[test]
    fn dispute_conflict_is_already_exists() {
        let err = EscrowError::DisputeAlreadyActive {
            job_id: JobId::new("job-1"),
            case_id: CaseId::new(),
        };
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn window_closed_is_deadline_exceeded() {
        let err = EscrowError::DisputeWindowClosed {
            payment_id: PaymentId::new("pi_1"),
            deadline: Timestamp::now(),
        };
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    }

    #[test]
    fn gateway_kinds() {
        let transport = GatewayError::Transport {
            endpoint: "POST /v1/refunds".into(),
            message: "timeout".into(),
        };
        assert_eq!(EscrowError::from(transport).kind(), ErrorKind::Unavailable);

        let rejected = GatewayError::Rejected {
            endpoint: "POST /v1/refunds".into(),
            status: 400,
            body: "amount too large".into(),
        };
        assert_eq!(EscrowError::from(rejected).kind(), ErrorKind::Internal);

        let throttled = GatewayError::Rejected {
            endpoint: "POST /v1/refunds".into(),
            status: 503,
            body: String::new(),
        };
        assert_eq!(throttled.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn ledger_kinds() {
        assert_eq!(
            EscrowError::from(LedgerError::Unavailable("pool".into())).kind(),
            ErrorKind::Unavailable
        );
        assert_eq!(
            EscrowError::from(LedgerError::Backend("syntax".into())).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn signature_errors_are_unauthenticated() {
        let err = EscrowError::from(SignatureError::Mismatch);
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    }
}
