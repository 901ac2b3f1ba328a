//! # Processor Webhooks
//!
//! Mounted outside bearer auth. Deliveries are authenticated by their
//! signature header against the raw body, so the body is taken as bytes
//! and never re-serialized before verification.
//!
//! Duplicate deliveries and unknown records answer 200 with outcome
//! `ignored`. Store or processor failures answer 5xx so the processor
//! retries the delivery.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use fixmate_escrow::WebhookOutcome;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying `t=...,v1=...`.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    /// `applied` or `ignored`.
    pub outcome: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/webhooks/payments", post(receive))
}

/// POST /v1/webhooks/payments — Processor event delivery.
#[utoipa::path(
    post,
    path = "/v1/webhooks/payments",
    request_body(content = String, description = "Raw processor event envelope", content_type = "application/json"),
    responses(
        (status = 200, description = "Event processed or ignored", body = WebhookAck),
        (status = 401, description = "Signature missing or invalid", body = crate::error::ErrorBody),
        (status = 422, description = "Malformed event", body = crate::error::ErrorBody),
    ),
    tag = "webhooks"
)]
pub(crate) async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state.escrow.receive_webhook(&body, signature).await?;
    Ok(Json(WebhookAck {
        received: true,
        outcome: match outcome {
            WebhookOutcome::Applied => "applied",
            WebhookOutcome::Ignored => "ignored",
        }
        .to_string(),
    }))
}
