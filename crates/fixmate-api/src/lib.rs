//! # fixmate-api — Escrow API Service
//!
//! Axum service exposing the escrow and dispute engines of the marketplace.
//!
//! ## Routes
//!
//! - `/v1/payments/*` — intents, reads, release, refunds
//! - `/v1/disputes/*` — open, evidence, resolve, reads
//! - `/v1/sweeps/*` — on-demand sweep runs (system role)
//! - `/v1/webhooks/payments` — processor events (signature-verified, no bearer)
//! - `/openapi.json` — generated OpenAPI document
//! - `/health/*` — liveness and readiness probes (unauthenticated)
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → AuthLayer on the bearer-authenticated routes; TraceLayer
//! only on webhooks and probes.
//!
//! ## Crate Policy
//!
//! - No business logic in route handlers. Handlers translate HTTP to engine
//!   calls and engine errors to status codes.
//! - All errors map to structured HTTP responses via `AppError`.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod openapi;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use error::AppError;
pub use state::{AppConfig, AppState};

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes and the processor webhook are mounted outside the auth
/// middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        secret: state.config.auth_secret.clone(),
    };

    let api = Router::new()
        .merge(routes::payments::router())
        .merge(routes::disputes::router())
        .merge(routes::sweeps::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let webhooks = routes::webhooks::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .with_state(state);

    Router::new().merge(health).merge(webhooks).merge(api)
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — 503 while the database does not answer.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.is_ready().await {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}
