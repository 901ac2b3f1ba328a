//! # Payments API
//!
//! Escrow charges for jobs: intent creation, reads, release to the
//! provider, and refunds.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use fixmate_core::{ConnectedAccountId, JobId, Money, PaymentId, Uid};
use fixmate_escrow::CreateIntentInput;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_optional_json, extract_validated_json, Validate};
use crate::state::AppState;

// -- Request / response types -------------------------------------------------

/// Create a payment intent for a job.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    #[schema(value_type = String)]
    pub job_id: JobId,
    #[schema(value_type = String)]
    pub customer_uid: Uid,
    /// Decimal major units, e.g. `"100.00"` or `100`.
    #[schema(value_type = String, example = "100.00")]
    pub amount: Money,
    #[schema(example = "eur")]
    pub currency: String,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub connected_account_id: Option<ConnectedAccountId>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntentResponse {
    pub payment_id: String,
    pub client_secret: String,
}

/// Release options. `manualRelease` defaults to `true`: the customer
/// confirms the work and the hold is skipped. An empty body means the same.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRequest {
    #[serde(default = "default_manual")]
    pub manual_release: bool,
}

fn default_manual() -> bool {
    true
}

impl Default for ReleaseRequest {
    fn default() -> Self {
        Self {
            manual_release: default_manual(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResponse {
    pub transfer_id: String,
    #[schema(value_type = String)]
    pub amount_net: Money,
    #[schema(value_type = String)]
    pub platform_fee: Money,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    #[schema(value_type = String, example = "30.00")]
    pub amount: Money,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Validate for RefundRequest {
    fn validate(&self) -> Result<(), String> {
        match &self.reason {
            Some(r) if r.len() > 500 => Err("reason must not exceed 500 characters".into()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    pub refund_id: String,
    #[schema(value_type = String)]
    pub amount: Money,
    pub currency: String,
}

/// Payment record with its transfer and refunds.
#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct PaymentDocument(#[schema(value_type = Object)] pub serde_json::Value);

// -- Router -------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/payments/intents", post(create_intent))
        .route("/v1/payments/:id", get(get_payment))
        .route("/v1/payments/:id/release", post(release_payment))
        .route("/v1/payments/:id/refunds", post(refund_payment))
}

/// POST /v1/payments/intents — Create a payment intent.
#[utoipa::path(
    post,
    path = "/v1/payments/intents",
    request_body = CreateIntentRequest,
    responses(
        (status = 201, description = "Intent created", body = IntentResponse),
        (status = 403, description = "Caller is not the job's customer", body = crate::error::ErrorBody),
        (status = 404, description = "Job not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid amount or currency", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub(crate) async fn create_intent(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Result<Json<CreateIntentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IntentResponse>), AppError> {
    let req = extract_json(body)?;
    let caller = identity.caller();
    let created = state
        .escrow
        .create_payment_intent(
            Some(&caller),
            CreateIntentInput {
                job_id: req.job_id,
                customer_uid: req.customer_uid,
                amount: req.amount,
                currency: req.currency,
                connected_account_id: req.connected_account_id,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(IntentResponse {
            payment_id: created.payment_id.to_string(),
            client_secret: created.client_secret,
        }),
    ))
}

/// GET /v1/payments/:id — Read a payment.
#[utoipa::path(
    get,
    path = "/v1/payments/{id}",
    params(("id" = String, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment with transfer and refunds", body = PaymentDocument),
        (status = 403, description = "Caller is not a party", body = crate::error::ErrorBody),
        (status = 404, description = "Payment not found", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub(crate) async fn get_payment(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(id): Path<String>,
) -> Result<Json<PaymentDocument>, AppError> {
    let caller = identity.caller();
    let details = state
        .escrow
        .get_payment(Some(&caller), &PaymentId::new(id))
        .await?;
    let doc = serde_json::to_value(details).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(PaymentDocument(doc)))
}

/// POST /v1/payments/:id/release — Release escrow to the provider.
#[utoipa::path(
    post,
    path = "/v1/payments/{id}/release",
    params(("id" = String, Path, description = "Payment id")),
    request_body = ReleaseRequest,
    responses(
        (status = 200, description = "Transfer initiated", body = ReleaseResponse),
        (status = 403, description = "Caller may not release", body = crate::error::ErrorBody),
        (status = 409, description = "Not releasable (status, hold, dispute, account)", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub(crate) async fn release_payment(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ReleaseResponse>, AppError> {
    let req: ReleaseRequest = extract_optional_json(&body)?;
    let receipt = state
        .escrow
        .release_transfer(&identity.actor(), &PaymentId::new(id), req.manual_release)
        .await?;
    Ok(Json(ReleaseResponse {
        transfer_id: receipt.transfer_id.to_string(),
        amount_net: receipt.amount_net,
        platform_fee: receipt.platform_fee,
    }))
}

/// POST /v1/payments/:id/refunds — Refund part of a captured payment.
#[utoipa::path(
    post,
    path = "/v1/payments/{id}/refunds",
    params(("id" = String, Path, description = "Payment id")),
    request_body = RefundRequest,
    responses(
        (status = 201, description = "Refund issued", body = RefundResponse),
        (status = 409, description = "Payment not refundable", body = crate::error::ErrorBody),
        (status = 422, description = "Amount out of range", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub(crate) async fn refund_payment(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<RefundRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RefundResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let caller = identity.caller();
    let receipt = state
        .escrow
        .partial_refund(Some(&caller), &PaymentId::new(id), req.amount, req.reason)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RefundResponse {
            refund_id: receipt.refund_id.to_string(),
            amount: receipt.amount,
            currency: receipt.currency,
        }),
    ))
}
