//! # OpenAPI Document Assembly
//!
//! Assembles the utoipa-documented routes into one OpenAPI document served
//! at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fixmate Escrow API",
        version = "0.1.0",
        description = "Escrow payments and disputes for the home-services marketplace: payment intents, timed and manual release, refunds, dispute lifecycle, and processor webhooks.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // Payments
        crate::routes::payments::create_intent,
        crate::routes::payments::get_payment,
        crate::routes::payments::release_payment,
        crate::routes::payments::refund_payment,
        // Disputes
        crate::routes::disputes::open_dispute,
        crate::routes::disputes::get_dispute,
        crate::routes::disputes::add_evidence,
        crate::routes::disputes::resolve_dispute,
        // Webhooks
        crate::routes::webhooks::receive,
        // Sweeps
        crate::routes::sweeps::run_release,
        crate::routes::sweeps::run_expiry,
        crate::routes::sweeps::run_reminders,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::payments::CreateIntentRequest,
        crate::routes::payments::IntentResponse,
        crate::routes::payments::ReleaseRequest,
        crate::routes::payments::ReleaseResponse,
        crate::routes::payments::RefundRequest,
        crate::routes::payments::RefundResponse,
        crate::routes::payments::PaymentDocument,
        crate::routes::disputes::OpenDisputeRequest,
        crate::routes::disputes::DisputeOpenedResponse,
        crate::routes::disputes::EvidenceRequest,
        crate::routes::disputes::ResolveRequest,
        crate::routes::disputes::ResolutionResponse,
        crate::routes::disputes::AckResponse,
        crate::routes::disputes::DisputeDocument,
        crate::routes::webhooks::WebhookAck,
        crate::routes::sweeps::ReleaseSweepResponse,
        crate::routes::sweeps::ExpirySweepResponse,
        crate::routes::sweeps::ReminderSweepResponse,
    )),
    tags(
        (name = "payments", description = "Escrowed job payments"),
        (name = "disputes", description = "Customer disputes and admin decisions"),
        (name = "webhooks", description = "Payment processor events"),
        (name = "sweeps", description = "Scheduled maintenance sweeps"),
    )
)]
pub struct ApiDoc;

/// Serves the OpenAPI JSON spec at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
