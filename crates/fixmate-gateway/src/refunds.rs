//! Refunds against a payment intent.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/v1/refunds` | Refund part or all of a captured charge |

use fixmate_escrow::ports::{CreatedRefund, RefundRequest};

use crate::error::PaymentsApiError;

const API_PREFIX: &str = "v1";

/// The processor accepts only a fixed set of reason codes. Free-text reasons
/// travel in metadata.
const REASON_CODE: &str = "requested_by_customer";

#[derive(Debug, Clone)]
pub struct RefundClient {
    http: reqwest::Client,
    base_url: url::Url,
}

impl RefundClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url) -> Self {
        Self { http, base_url }
    }

    /// Calls `POST {base_url}/v1/refunds`.
    pub async fn create(&self, req: &RefundRequest) -> Result<CreatedRefund, PaymentsApiError> {
        let endpoint = "POST /v1/refunds";
        let url = format!("{}{}/refunds", self.base_url, API_PREFIX);

        let mut form = vec![
            ("payment_intent", req.payment_id.to_string()),
            ("amount", req.amount_minor.to_string()),
            ("reason", REASON_CODE.to_string()),
        ];
        if let Some(reason) = &req.reason {
            form.push(("metadata[reason]", reason.clone()));
        }

        crate::request::post_form(&self.http, &url, endpoint, &req.idempotency_key, &form).await
    }
}
