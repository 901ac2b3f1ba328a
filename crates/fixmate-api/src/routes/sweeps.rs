//! # Sweep Triggers
//!
//! On-demand runs of the scheduled sweeps, for an external cron or an
//! operator. Restricted to the `system` role.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{require_system, CallerIdentity};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReleaseSweepResponse {
    pub released: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExpirySweepResponse {
    pub updated: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReminderSweepResponse {
    pub reminded: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/sweeps/release", post(run_release))
        .route("/v1/sweeps/expire", post(run_expiry))
        .route("/v1/sweeps/remind", post(run_reminders))
}

/// POST /v1/sweeps/release — Release every payment whose hold elapsed.
#[utoipa::path(
    post,
    path = "/v1/sweeps/release",
    responses(
        (status = 200, description = "Sweep report", body = ReleaseSweepResponse),
        (status = 403, description = "System role required", body = crate::error::ErrorBody),
    ),
    tag = "sweeps"
)]
pub(crate) async fn run_release(
    State(state): State<AppState>,
    identity: CallerIdentity,
) -> Result<Json<ReleaseSweepResponse>, AppError> {
    require_system(&identity)?;
    let report = state.escrow.release_due_payments().await?;
    Ok(Json(ReleaseSweepResponse {
        released: report.released,
        skipped: report.skipped,
        failed: report.failed,
    }))
}

/// POST /v1/sweeps/expire — Expire disputes past their decision deadline.
#[utoipa::path(
    post,
    path = "/v1/sweeps/expire",
    responses(
        (status = 200, description = "Sweep report", body = ExpirySweepResponse),
        (status = 403, description = "System role required", body = crate::error::ErrorBody),
    ),
    tag = "sweeps"
)]
pub(crate) async fn run_expiry(
    State(state): State<AppState>,
    identity: CallerIdentity,
) -> Result<Json<ExpirySweepResponse>, AppError> {
    require_system(&identity)?;
    let report = state.disputes.expire_disputes().await?;
    Ok(Json(ExpirySweepResponse {
        updated: report.updated,
        failed: report.failed,
    }))
}

/// POST /v1/sweeps/remind — Flag disputes nearing their decision deadline.
#[utoipa::path(
    post,
    path = "/v1/sweeps/remind",
    responses(
        (status = 200, description = "Sweep report", body = ReminderSweepResponse),
        (status = 403, description = "System role required", body = crate::error::ErrorBody),
    ),
    tag = "sweeps"
)]
pub(crate) async fn run_reminders(
    State(state): State<AppState>,
    identity: CallerIdentity,
) -> Result<Json<ReminderSweepResponse>, AppError> {
    require_system(&identity)?;
    let report = state.disputes.remind_moderation().await?;
    Ok(Json(ReminderSweepResponse {
        reminded: report.reminded,
    }))
}
