//! Typed processor webhook events.
//!
//! Each variant carries only the fields its handler needs. The wire envelope
//! is decoded by the gateway adapter; anything it does not recognize becomes
//! [`ProcessorEvent::Unknown`], which is logged and ignored.

use fixmate_core::{ChargeId, ConnectedAccountId, PaymentId, TransferId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProcessorEvent {
    #[serde(rename = "payment_intent.succeeded")]
    PaymentIntentSucceeded {
        event_id: String,
        payment_id: PaymentId,
        charge_id: Option<ChargeId>,
    },
    #[serde(rename = "transfer.created")]
    TransferCreated {
        event_id: String,
        transfer_id: TransferId,
    },
    #[serde(rename = "charge.refunded")]
    ChargeRefunded {
        event_id: String,
        charge_id: ChargeId,
        payment_id: Option<PaymentId>,
        /// Cumulative refunded amount in minor units.
        amount_refunded_minor: i64,
    },
    #[serde(rename = "account.updated")]
    AccountUpdated {
        event_id: String,
        account_id: ConnectedAccountId,
        charges_enabled: bool,
        payouts_enabled: bool,
    },
    #[serde(rename = "unknown")]
    Unknown { event_id: String, event_type: String },
}

impl ProcessorEvent {
    /// The processor's event type string.
    pub fn event_type(&self) -> &str {
        match self {
            Self::PaymentIntentSucceeded { .. } => "payment_intent.succeeded",
            Self::TransferCreated { .. } => "transfer.created",
            Self::ChargeRefunded { .. } => "charge.refunded",
            Self::AccountUpdated { .. } => "account.updated",
            Self::Unknown { event_type, .. } => event_type,
        }
    }

    pub fn event_id(&self) -> &str {
        match self {
            Self::PaymentIntentSucceeded { event_id, .. }
            | Self::TransferCreated { event_id, .. }
            | Self::ChargeRefunded { event_id, .. }
            | Self::AccountUpdated { event_id, .. }
            | Self::Unknown { event_id, .. } => event_id,
        }
    }
}

/// What a webhook handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// State changed.
    Applied,
    /// Unknown record, duplicate delivery, or unhandled type.
    Ignored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_strings() {
        let e = ProcessorEvent::TransferCreated {
            event_id: "evt_1".into(),
            transfer_id: TransferId::new("tr_1"),
        };
        assert_eq!(e.event_type(), "transfer.created");
        assert_eq!(e.event_id(), "evt_1");

        let u = ProcessorEvent::Unknown {
            event_id: "evt_2".into(),
            event_type: "customer.created".into(),
        };
        assert_eq!(u.event_type(), "customer.created");
    }

    #[test]
    fn tagged_serialization() {
        let e = ProcessorEvent::ChargeRefunded {
            event_id: "evt_3".into(),
            charge_id: ChargeId::new("ch_1"),
            payment_id: None,
            amount_refunded_minor: 2500,
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "charge.refunded");
        assert_eq!(json["amount_refunded_minor"], 2500);
    }
}
