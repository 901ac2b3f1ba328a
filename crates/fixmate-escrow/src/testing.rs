//! Test doubles for the gateway and sink ports.
//!
//! [`ScriptedGateway`] records every processor call, hands out sequential
//! ids, replays the same id for a repeated idempotency key, and can be told
//! to fail the next call. [`RecordingSink`] captures notifications and
//! analytics events.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fixmate_core::{PaymentId, RefundId, Timestamp, TransferId};
use parking_lot::Mutex;

use crate::error::{EscrowError, GatewayError, SignatureError, SinkError};
use crate::events::ProcessorEvent;
use crate::ports::{
    AnalyticsEvent, AnalyticsSink, CreatedIntent, CreatedRefund, CreatedTransfer, IntentRequest,
    Notification, NotificationSink, PaymentGateway, RefundRequest, TransferRequest,
};

/// A processor call captured by [`ScriptedGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Intent(IntentRequest),
    Transfer(TransferRequest),
    Refund(RefundRequest),
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<GatewayCall>,
    issued: HashMap<String, String>,
    next_id: u32,
    fail_next: Option<GatewayError>,
}

/// In-process payment processor.
///
/// Webhook payloads are the JSON form of [`ProcessorEvent`]; the only valid
/// signature header is [`ScriptedGateway::SIGNATURE`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedGateway {
    script: Arc<Mutex<Script>>,
}

impl ScriptedGateway {
    pub const SIGNATURE: &'static str = "t=0,v1=scripted";

    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next processor call fail with `error`.
    pub fn fail_next(&self, error: GatewayError) {
        self.script.lock().fail_next = Some(error);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.script.lock().calls.clone()
    }

    pub fn refunds(&self) -> Vec<RefundRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::Refund(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn transfers(&self) -> Vec<TransferRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::Transfer(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    fn issue(&self, call: GatewayCall, prefix: &str, key: &str) -> Result<String, GatewayError> {
        let mut script = self.script.lock();
        script.calls.push(call);
        if let Some(err) = script.fail_next.take() {
            return Err(err);
        }
        if let Some(id) = script.issued.get(key) {
            return Ok(id.clone());
        }
        script.next_id += 1;
        let id = format!("{prefix}_test_{}", script.next_id);
        script.issued.insert(key.to_string(), id.clone());
        Ok(id)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_payment_intent(
        &self,
        req: IntentRequest,
    ) -> Result<CreatedIntent, GatewayError> {
        let key = req.idempotency_key.clone();
        let id = self.issue(GatewayCall::Intent(req), "pi", &key)?;
        Ok(CreatedIntent {
            client_secret: format!("{id}_secret"),
            id: PaymentId::new(id),
        })
    }

    async fn create_transfer(&self, req: TransferRequest) -> Result<CreatedTransfer, GatewayError> {
        let key = req.idempotency_key.clone();
        let id = self.issue(GatewayCall::Transfer(req), "tr", &key)?;
        Ok(CreatedTransfer {
            id: TransferId::new(id),
        })
    }

    async fn create_refund(&self, req: RefundRequest) -> Result<CreatedRefund, GatewayError> {
        let key = req.idempotency_key.clone();
        let id = self.issue(GatewayCall::Refund(req), "re", &key)?;
        Ok(CreatedRefund {
            id: RefundId::new(id),
        })
    }

    fn verify_webhook_signature(
        &self,
        _payload: &[u8],
        signature_header: &str,
        _now: Timestamp,
    ) -> Result<(), SignatureError> {
        match signature_header {
            "" => Err(SignatureError::MissingHeader),
            h if h == Self::SIGNATURE => Ok(()),
            _ => Err(SignatureError::Mismatch),
        }
    }

    fn parse_event(&self, payload: &[u8]) -> Result<ProcessorEvent, EscrowError> {
        serde_json::from_slice(payload).map_err(|e| EscrowError::MalformedEvent(e.to_string()))
    }
}

#[derive(Debug, Default)]
struct Recorded {
    notifications: Vec<Notification>,
    events: Vec<AnalyticsEvent>,
    failing: bool,
}

/// Captures side effects. With [`RecordingSink::failing`] every call fails
/// after being recorded.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let sink = Self::default();
        sink.inner.lock().failing = true;
        sink
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.inner.lock().notifications.clone()
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.inner.lock().events.clone()
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.inner.lock().events.iter().map(|e| e.name).collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send_push_notification(&self, notification: Notification) -> Result<(), SinkError> {
        let mut inner = self.inner.lock();
        inner.notifications.push(notification);
        if inner.failing {
            return Err(SinkError {
                sink: "push",
                message: "recording sink set to fail".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AnalyticsSink for RecordingSink {
    async fn log_server_event(&self, event: AnalyticsEvent) -> Result<(), SinkError> {
        let mut inner = self.inner.lock();
        inner.events.push(event);
        if inner.failing {
            return Err(SinkError {
                sink: "analytics",
                message: "recording sink set to fail".into(),
            });
        }
        Ok(())
    }
}
