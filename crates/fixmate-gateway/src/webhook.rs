//! Webhook signature verification and event decoding.
//!
//! The processor signs each delivery with a header of the form
//! `t=<unix secs>,v1=<hex hmac>[,v1=<hex hmac>...]`. The MAC is
//! HMAC-SHA256 over `"{t}.{raw body}"` keyed by the endpoint's webhook
//! secret. Several `v1` entries appear while a secret is being rolled; any
//! one matching is accepted.

use fixmate_core::{ChargeId, ConnectedAccountId, PaymentId, Timestamp, TransferId};
use fixmate_escrow::{EscrowError, ProcessorEvent, SignatureError};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Verifies signature headers against a shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Zeroizing<String>,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"[REDACTED]")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl WebhookVerifier {
    pub fn new(secret: Zeroizing<String>, tolerance_secs: i64) -> Self {
        Self {
            secret,
            tolerance_secs,
        }
    }

    /// Check `header` against `payload` at time `now`.
    pub fn verify(&self, payload: &[u8], header: &str, now: Timestamp) -> Result<(), SignatureError> {
        let header = header.trim();
        if header.is_empty() {
            return Err(SignatureError::MissingHeader);
        }

        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<&str> = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", v)) => {
                    timestamp = Some(v.parse().map_err(|_| SignatureError::Malformed)?)
                }
                Some(("v1", v)) => candidates.push(v),
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
        if candidates.is_empty() {
            return Err(SignatureError::Malformed);
        }

        let skew = now.epoch_secs().abs_diff(timestamp);
        if skew > self.tolerance_secs.unsigned_abs() {
            return Err(SignatureError::OutsideTolerance {
                timestamp,
                tolerance_secs: self.tolerance_secs,
            });
        }

        let expected = self.mac(timestamp, payload)?;
        let matched = candidates.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|given| bool::from(given.ct_eq(&expected)))
                .unwrap_or(false)
        });
        if matched {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Build a valid signature header for `payload` signed at `timestamp`.
    /// Used to sign deliveries in test fixtures and local replays.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
        let mac = self.mac(timestamp, payload)?;
        Ok(format!("t={timestamp},v1={}", hex::encode(mac)))
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| SignatureError::Malformed)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

// -- Event envelope ----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct IntentObject {
    id: String,
    #[serde(default)]
    latest_charge: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransferObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChargeObject {
    id: String,
    #[serde(default)]
    payment_intent: Option<String>,
    amount_refunded: i64,
}

#[derive(Debug, Deserialize)]
struct AccountObject {
    id: String,
    #[serde(default)]
    charges_enabled: bool,
    #[serde(default)]
    payouts_enabled: bool,
}

/// Decode a processor event envelope into a typed event. Unrecognized event
/// types become [`ProcessorEvent::Unknown`].
pub fn parse_event(payload: &[u8]) -> Result<ProcessorEvent, EscrowError> {
    let envelope: Envelope = serde_json::from_slice(payload)
        .map_err(|e| EscrowError::MalformedEvent(e.to_string()))?;
    let event_id = envelope.id;
    let object = envelope.data.object;

    let event = match envelope.event_type.as_str() {
        "payment_intent.succeeded" => {
            let o: IntentObject = decode_object(&envelope.event_type, object)?;
            ProcessorEvent::PaymentIntentSucceeded {
                event_id,
                payment_id: PaymentId::new(o.id),
                charge_id: o.latest_charge.map(ChargeId::new),
            }
        }
        "transfer.created" => {
            let o: TransferObject = decode_object(&envelope.event_type, object)?;
            ProcessorEvent::TransferCreated {
                event_id,
                transfer_id: TransferId::new(o.id),
            }
        }
        "charge.refunded" => {
            let o: ChargeObject = decode_object(&envelope.event_type, object)?;
            ProcessorEvent::ChargeRefunded {
                event_id,
                charge_id: ChargeId::new(o.id),
                payment_id: o.payment_intent.map(PaymentId::new),
                amount_refunded_minor: o.amount_refunded,
            }
        }
        "account.updated" => {
            let o: AccountObject = decode_object(&envelope.event_type, object)?;
            ProcessorEvent::AccountUpdated {
                event_id,
                account_id: ConnectedAccountId::new(o.id),
                charges_enabled: o.charges_enabled,
                payouts_enabled: o.payouts_enabled,
            }
        }
        _ => ProcessorEvent::Unknown {
            event_id,
            event_type: envelope.event_type,
        },
    };
    Ok(event)
}

fn decode_object<T: serde::de::DeserializeOwned>(
    event_type: &str,
    object: serde_json::Value,
) -> Result<T, EscrowError> {
    serde_json::from_value(object)
        .map_err(|e| EscrowError::MalformedEvent(format!("{event_type}: {e}")))
}
