//! Form-encoded POST shared by the resource clients.

use serde::de::DeserializeOwned;

use crate::error::PaymentsApiError;

/// Header the processor uses to deduplicate retried writes.
pub(crate) const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// POST `form` to `url` with an idempotency key, retrying transport
/// failures and 5xx/429 answers, and decode a 2xx JSON body.
pub(crate) async fn post_form<T: DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    endpoint: &str,
    idempotency_key: &str,
    form: &[(&str, String)],
) -> Result<T, PaymentsApiError> {
    let resp = crate::retry::send_with_retry(endpoint, || {
        http.post(url)
            .header(IDEMPOTENCY_HEADER, idempotency_key)
            .form(form)
            .send()
    })
    .await
    .map_err(|e| PaymentsApiError::Http {
        endpoint: endpoint.into(),
        source: e,
    })?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read response body: {e}>"));
        return Err(PaymentsApiError::ApiError {
            endpoint: endpoint.into(),
            status,
            body,
        });
    }

    resp.json()
        .await
        .map_err(|e| PaymentsApiError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })
}
