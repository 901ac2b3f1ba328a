//! # fixmate-api — Binary Entry Point
//!
//! Starts the Axum HTTP server and the sweep scheduler.
//! Binds to configurable port (default 8080).

use std::sync::Arc;

use anyhow::Context;
use fixmate_api::db::ledger::PgLedger;
use fixmate_api::state::{AppConfig, AppState};
use fixmate_escrow::{Collaborators, EscrowPolicy, InMemoryLedger, LedgerStore};
use fixmate_gateway::{GatewayConfig, PaymentsClient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured tracing. LOG_FORMAT=json for log shippers.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = AppConfig::from_env();
    tracing::info!(?config, "configuration loaded");

    let policy = EscrowPolicy::from_env().context("invalid escrow policy")?;

    let gateway_config = GatewayConfig::from_env().context("payment processor not configured")?;
    let gateway = PaymentsClient::new(gateway_config).context("building payment processor client")?;
    tracing::info!("payment processor client configured");

    // Initialize database pool (optional — absent means in-memory only).
    let db_pool = fixmate_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let ledger: Arc<dyn LedgerStore> = match &db_pool {
        Some(pool) => Arc::new(PgLedger::new(pool.clone())),
        None => Arc::new(InMemoryLedger::new()),
    };

    let ctx = Collaborators::new(ledger, Arc::new(gateway)).with_policy(policy);
    let port = config.port;
    let state = AppState::new(config, ctx, db_pool);

    let sweeps = fixmate_api::scheduler::spawn(&state);
    let app = fixmate_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("fixmate API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    sweeps.abort();
    Ok(())
}
