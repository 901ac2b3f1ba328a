//! # fixmate-gateway -- Typed client for the payment processor
//!
//! Implements the escrow [`PaymentGateway`] port over the processor's REST
//! API:
//! - **Intents** via `POST /v1/payment_intents`
//! - **Transfers** via `POST /v1/transfers`
//! - **Refunds** via `POST /v1/refunds`
//! - **Webhooks**: HMAC-SHA256 signature verification and envelope decoding
//!
//! ## Conventions
//!
//! Requests are form-encoded and authenticated with the secret key as a
//! Bearer token. Every write carries the `Idempotency-Key` the engine
//! derived from its local record, and transport failures are retried with
//! exponential backoff.

pub mod config;
pub mod error;
pub mod intents;
pub mod refunds;
pub(crate) mod request;
pub(crate) mod retry;
pub mod transfers;
pub mod webhook;

pub use config::GatewayConfig;
pub use error::PaymentsApiError;
pub use webhook::WebhookVerifier;

use std::time::Duration;

use async_trait::async_trait;
use fixmate_core::Timestamp;
use fixmate_escrow::ports::{
    CreatedIntent, CreatedRefund, CreatedTransfer, IntentRequest, PaymentGateway, RefundRequest,
    TransferRequest,
};
use fixmate_escrow::{EscrowError, GatewayError, ProcessorEvent, SignatureError};

/// Top-level processor client. Holds a sub-client per resource.
#[derive(Debug, Clone)]
pub struct PaymentsClient {
    intents: intents::IntentClient,
    transfers: transfers::TransferClient,
    refunds: refunds::RefundClient,
    webhooks: WebhookVerifier,
}

impl PaymentsClient {
    /// Create a new processor client from configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, PaymentsApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::AUTHORIZATION,
                    reqwest::header::HeaderValue::from_str(&format!(
                        "Bearer {}",
                        config.secret_key.as_str()
                    ))
                    .map_err(|_| PaymentsApiError::Config(config::ConfigError::MissingSecretKey))?,
                );
                headers
            })
            .build()
            .map_err(|e| PaymentsApiError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            intents: intents::IntentClient::new(http.clone(), config.api_url.clone()),
            transfers: transfers::TransferClient::new(http.clone(), config.api_url.clone()),
            refunds: refunds::RefundClient::new(http, config.api_url),
            webhooks: WebhookVerifier::new(config.webhook_secret, config.webhook_tolerance_secs),
        })
    }

    /// Access the payment intents client.
    pub fn intents(&self) -> &intents::IntentClient {
        &self.intents
    }

    /// Access the transfers client.
    pub fn transfers(&self) -> &transfers::TransferClient {
        &self.transfers
    }

    /// Access the refunds client.
    pub fn refunds(&self) -> &refunds::RefundClient {
        &self.refunds
    }

    /// Access the webhook signature verifier.
    pub fn webhooks(&self) -> &WebhookVerifier {
        &self.webhooks
    }
}

#[async_trait]
impl PaymentGateway for PaymentsClient {
    async fn create_payment_intent(
        &self,
        req: IntentRequest,
    ) -> Result<CreatedIntent, GatewayError> {
        Ok(self.intents.create(&req).await?)
    }

    async fn create_transfer(&self, req: TransferRequest) -> Result<CreatedTransfer, GatewayError> {
        Ok(self.transfers.create(&req).await?)
    }

    async fn create_refund(&self, req: RefundRequest) -> Result<CreatedRefund, GatewayError> {
        Ok(self.refunds.create(&req).await?)
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: Timestamp,
    ) -> Result<(), SignatureError> {
        self.webhooks.verify(payload, signature_header, now)
    }

    fn parse_event(&self, payload: &[u8]) -> Result<ProcessorEvent, EscrowError> {
        webhook::parse_event(payload)
    }
}
