//! # Disputes API
//!
//! Customer complaints against captured payments: opening, evidence from
//! either party, admin resolution, and reads.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use fixmate_core::{CaseId, JobId, Money, PaymentId};
use fixmate_escrow::{Decision, OpenDisputeInput, PartyRole};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::state::AppState;

const MAX_MEDIA_PATHS: usize = 20;

// -- Request / response types -------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenDisputeRequest {
    #[schema(value_type = String)]
    pub job_id: JobId,
    #[schema(value_type = String)]
    pub payment_id: PaymentId,
    pub reason: String,
    #[serde(default)]
    pub description: String,
    #[schema(value_type = String, example = "50.00")]
    pub requested_amount: Money,
    #[serde(default)]
    pub media_paths: Vec<String>,
}

impl Validate for OpenDisputeRequest {
    fn validate(&self) -> Result<(), String> {
        if self.media_paths.len() > MAX_MEDIA_PATHS {
            return Err(format!("at most {MAX_MEDIA_PATHS} media paths are allowed"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisputeOpenedResponse {
    pub case_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRequest {
    /// `customer` or `pro`.
    #[schema(value_type = String, example = "customer")]
    pub role: PartyRole,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media_path: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    /// `refund_full`, `refund_partial` or `no_refund`.
    #[schema(value_type = String, example = "refund_partial")]
    pub decision: Decision,
    /// Required for `refund_partial`.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub amount: Option<Money>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResponse {
    pub success: bool,
    #[schema(value_type = String)]
    pub refund_amount: Money,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AckResponse {
    pub success: bool,
}

/// Dispute record with evidence and audit trail.
#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct DisputeDocument(#[schema(value_type = Object)] pub serde_json::Value);

// -- Router -------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/disputes", post(open_dispute))
        .route("/v1/disputes/:case_id", get(get_dispute))
        .route("/v1/disputes/:case_id/evidence", post(add_evidence))
        .route("/v1/disputes/:case_id/resolve", post(resolve_dispute))
}

fn parse_case_id(raw: &str) -> Result<CaseId, AppError> {
    raw.parse()
        .map_err(|e| AppError::Validation(format!("invalid case id {raw:?}: {e}")))
}

/// POST /v1/disputes — Open a dispute on a captured payment.
#[utoipa::path(
    post,
    path = "/v1/disputes",
    request_body = OpenDisputeRequest,
    responses(
        (status = 201, description = "Dispute opened", body = DisputeOpenedResponse),
        (status = 409, description = "Payment not captured or dispute already active", body = crate::error::ErrorBody),
        (status = 410, description = "Dispute window closed", body = crate::error::ErrorBody),
    ),
    tag = "disputes"
)]
pub(crate) async fn open_dispute(
    State(state): State<AppState>,
    identity: CallerIdentity,
    body: Result<Json<OpenDisputeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DisputeOpenedResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let caller = identity.caller();
    let opened = state
        .disputes
        .open_dispute(
            Some(&caller),
            OpenDisputeInput {
                job_id: req.job_id,
                payment_id: req.payment_id,
                reason: req.reason,
                description: req.description,
                requested_amount: req.requested_amount,
                media_paths: req.media_paths,
            },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(DisputeOpenedResponse {
            case_id: opened.case_id.to_string(),
        }),
    ))
}

/// GET /v1/disputes/:case_id — Read a dispute.
#[utoipa::path(
    get,
    path = "/v1/disputes/{case_id}",
    params(("case_id" = String, Path, description = "Dispute case id (UUID)")),
    responses(
        (status = 200, description = "Dispute", body = DisputeDocument),
        (status = 403, description = "Caller is not a party", body = crate::error::ErrorBody),
        (status = 404, description = "Dispute not found", body = crate::error::ErrorBody),
    ),
    tag = "disputes"
)]
pub(crate) async fn get_dispute(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(case_id): Path<String>,
) -> Result<Json<DisputeDocument>, AppError> {
    let case_id = parse_case_id(&case_id)?;
    let caller = identity.caller();
    let dispute = state.disputes.get_dispute(Some(&caller), case_id).await?;
    let doc = serde_json::to_value(dispute).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(DisputeDocument(doc)))
}

/// POST /v1/disputes/:case_id/evidence — Add evidence.
#[utoipa::path(
    post,
    path = "/v1/disputes/{case_id}/evidence",
    params(("case_id" = String, Path, description = "Dispute case id (UUID)")),
    request_body = EvidenceRequest,
    responses(
        (status = 200, description = "Evidence recorded", body = AckResponse),
        (status = 403, description = "Caller is not that party", body = crate::error::ErrorBody),
        (status = 409, description = "Dispute no longer active", body = crate::error::ErrorBody),
    ),
    tag = "disputes"
)]
pub(crate) async fn add_evidence(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(case_id): Path<String>,
    body: Result<Json<EvidenceRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, AppError> {
    let case_id = parse_case_id(&case_id)?;
    let req = extract_json(body)?;
    let caller = identity.caller();
    state
        .disputes
        .add_evidence(Some(&caller), case_id, req.role, req.text, req.media_path)
        .await?;
    Ok(Json(AckResponse { success: true }))
}

/// POST /v1/disputes/:case_id/resolve — Admin decision.
#[utoipa::path(
    post,
    path = "/v1/disputes/{case_id}/resolve",
    params(("case_id" = String, Path, description = "Dispute case id (UUID)")),
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "Dispute resolved", body = ResolutionResponse),
        (status = 403, description = "Admin required", body = crate::error::ErrorBody),
        (status = 409, description = "Dispute already closed", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid refund amount", body = crate::error::ErrorBody),
    ),
    tag = "disputes"
)]
pub(crate) async fn resolve_dispute(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(case_id): Path<String>,
    body: Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Json<ResolutionResponse>, AppError> {
    let case_id = parse_case_id(&case_id)?;
    let req = extract_json(body)?;
    let caller = identity.caller();
    let resolution = state
        .disputes
        .resolve_dispute(Some(&caller), case_id, req.decision, req.amount)
        .await?;
    Ok(Json(ResolutionResponse {
        success: resolution.success,
        refund_amount: resolution.refund_amount,
    }))
}
