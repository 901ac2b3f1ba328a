//! Payment intents.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/v1/payment_intents` | Create an intent for a job's escrow charge |

use fixmate_escrow::ports::{CreatedIntent, IntentRequest};
use serde::Deserialize;

use crate::error::PaymentsApiError;

const API_PREFIX: &str = "v1";

/// Payment intent as returned by the processor. Only the fields the
/// escrow flow reads are decoded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProcessorIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IntentClient {
    http: reqwest::Client,
    base_url: url::Url,
}

impl IntentClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url) -> Self {
        Self { http, base_url }
    }

    /// Create a payment intent with automatic payment methods and the job
    /// recorded in metadata.
    ///
    /// Calls `POST {base_url}/v1/payment_intents`.
    pub async fn create(&self, req: &IntentRequest) -> Result<CreatedIntent, PaymentsApiError> {
        let endpoint = "POST /v1/payment_intents";
        let url = format!("{}{}/payment_intents", self.base_url, API_PREFIX);

        let mut form = vec![
            ("amount", req.amount_minor.to_string()),
            ("currency", req.currency.clone()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("metadata[job_id]", req.job_id.to_string()),
            ("metadata[customer_uid]", req.customer_uid.to_string()),
        ];
        if let Some(account) = &req.connected_account_id {
            form.push(("metadata[connected_account_id]", account.to_string()));
        }

        let intent: ProcessorIntent =
            crate::request::post_form(&self.http, &url, endpoint, &req.idempotency_key, &form)
                .await?;

        tracing::debug!(intent_id = %intent.id, status = ?intent.status, "payment intent created");
        Ok(CreatedIntent {
            id: intent.id.into(),
            client_secret: intent.client_secret.unwrap_or_default(),
        })
    }
}
