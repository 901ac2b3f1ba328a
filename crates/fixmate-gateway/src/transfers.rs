//! Transfers to connected accounts.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST   | `/v1/transfers` | Pay a provider's net share out of a captured charge |

use fixmate_escrow::ports::{CreatedTransfer, TransferRequest};

use crate::error::PaymentsApiError;

const API_PREFIX: &str = "v1";

#[derive(Debug, Clone)]
pub struct TransferClient {
    http: reqwest::Client,
    base_url: url::Url,
}

impl TransferClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url) -> Self {
        Self { http, base_url }
    }

    /// Calls `POST {base_url}/v1/transfers`. The job id is the transfer
    /// group so the charge and its payout reconcile together.
    pub async fn create(&self, req: &TransferRequest) -> Result<CreatedTransfer, PaymentsApiError> {
        let endpoint = "POST /v1/transfers";
        let url = format!("{}{}/transfers", self.base_url, API_PREFIX);

        let mut form = vec![
            ("amount", req.amount_minor.to_string()),
            ("currency", req.currency.clone()),
            ("destination", req.destination.to_string()),
            ("transfer_group", req.job_id.to_string()),
            ("metadata[payment_id]", req.payment_id.to_string()),
            ("metadata[job_id]", req.job_id.to_string()),
        ];
        if let Some(charge) = &req.source_charge {
            form.push(("source_transaction", charge.to_string()));
        }

        crate::request::post_form(&self.http, &url, endpoint, &req.idempotency_key, &form).await
    }
}
