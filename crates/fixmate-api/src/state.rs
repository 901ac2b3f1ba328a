//! # Application State
//!
//! Shared state handed to every handler: configuration, the two engines
//! (which share one set of collaborators), and the optional database pool
//! used by the readiness probe.

use fixmate_escrow::{Collaborators, DisputeEngine, EscrowEngine};
use sqlx::PgPool;
use zeroize::Zeroizing;

/// Application configuration.
///
/// Custom `Debug` redacts the auth secret.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. `None` disables the secret check.
    pub auth_secret: Option<Zeroizing<String>>,
    /// Seconds between escrow auto-release sweeps.
    pub release_sweep_secs: u64,
    /// Seconds between dispute expiry sweeps.
    pub expiry_sweep_secs: u64,
    /// Seconds between moderation reminder sweeps.
    pub reminder_sweep_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_secret", &self.auth_secret.as_ref().map(|_| "[REDACTED]"))
            .field("release_sweep_secs", &self.release_sweep_secs)
            .field("expiry_sweep_secs", &self.expiry_sweep_secs)
            .field("reminder_sweep_secs", &self.reminder_sweep_secs)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_secret: None,
            release_sweep_secs: 3600,
            expiry_sweep_secs: 3600,
            reminder_sweep_secs: 3600,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables: `PORT` (8080), `AUTH_SECRET` (unset disables the secret
    /// check), `RELEASE_SWEEP_SECS`, `EXPIRY_SWEEP_SECS`,
    /// `REMINDER_SWEEP_SECS` (3600 each).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_or("PORT", defaults.port),
            auth_secret: std::env::var("AUTH_SECRET")
                .ok()
                .filter(|s| !s.is_empty())
                .map(Zeroizing::new),
            release_sweep_secs: env_or("RELEASE_SWEEP_SECS", defaults.release_sweep_secs),
            expiry_sweep_secs: env_or("EXPIRY_SWEEP_SECS", defaults.expiry_sweep_secs),
            reminder_sweep_secs: env_or("REMINDER_SWEEP_SECS", defaults.reminder_sweep_secs),
        }
    }
}

fn env_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub escrow: EscrowEngine,
    pub disputes: DisputeEngine,
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(config: AppConfig, ctx: Collaborators, db_pool: Option<PgPool>) -> Self {
        Self {
            config,
            escrow: EscrowEngine::new(ctx.clone()),
            disputes: DisputeEngine::new(ctx),
            db_pool,
        }
    }

    /// Whether backing stores answer. Always true without a database.
    pub async fn is_ready(&self) -> bool {
        match &self.db_pool {
            Some(pool) => sqlx::query("SELECT 1").execute(pool).await.is_ok(),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let cfg = AppConfig {
            auth_secret: Some(Zeroizing::new("hunter2".into())),
            ..AppConfig::default()
        };
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("FIXMATE_TEST_SWEEP_SECS", "soon");
        assert_eq!(env_or("FIXMATE_TEST_SWEEP_SECS", 60u64), 60);
        std::env::remove_var("FIXMATE_TEST_SWEEP_SECS");
    }
}
