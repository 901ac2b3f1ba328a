//! Payment processor client configuration.
//!
//! Defaults point at the production processor API. Override via environment
//! variables or explicit construction for staging and tests.

use url::Url;
use zeroize::Zeroizing;

/// Default processor API base URL.
pub const DEFAULT_API_URL: &str = "https://api.stripe.com";

/// Default allowed clock skew between a webhook's signed timestamp and now.
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Configuration for the payment processor client.
///
/// Custom `Debug` implementation redacts both secrets.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL of the processor REST API.
    pub api_url: Url,
    /// Secret API key sent as a Bearer token.
    pub secret_key: Zeroizing<String>,
    /// Shared secret for webhook HMAC signatures.
    pub webhook_secret: Zeroizing<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum age, in seconds, of a signed webhook timestamp.
    pub webhook_tolerance_secs: i64,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_url", &self.api_url)
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .finish()
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `PAYMENTS_API_URL` (default: `https://api.stripe.com`)
    /// - `PAYMENTS_SECRET_KEY` (required)
    /// - `PAYMENTS_WEBHOOK_SECRET` (required)
    /// - `PAYMENTS_TIMEOUT_SECS` (default: 30)
    /// - `PAYMENTS_WEBHOOK_TOLERANCE_SECS` (default: 300)
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret_key =
            std::env::var("PAYMENTS_SECRET_KEY").map_err(|_| ConfigError::MissingSecretKey)?;
        let webhook_secret = std::env::var("PAYMENTS_WEBHOOK_SECRET")
            .map_err(|_| ConfigError::MissingWebhookSecret)?;

        Ok(Self {
            api_url: env_url("PAYMENTS_API_URL", DEFAULT_API_URL)?,
            secret_key: Zeroizing::new(secret_key),
            webhook_secret: Zeroizing::new(webhook_secret),
            timeout_secs: std::env::var("PAYMENTS_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            webhook_tolerance_secs: std::env::var("PAYMENTS_WEBHOOK_TOLERANCE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_WEBHOOK_TOLERANCE_SECS),
        })
    }

    /// Configuration pointing at a local mock server.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `base` does not parse.
    pub fn local_mock(base: &str, secret_key: &str, webhook_secret: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: Url::parse(base)
                .map_err(|e| ConfigError::InvalidUrl("local_mock".to_string(), e.to_string()))?,
            secret_key: Zeroizing::new(secret_key.to_string()),
            webhook_secret: Zeroizing::new(webhook_secret.to_string()),
            timeout_secs: 5,
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
        })
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("PAYMENTS_SECRET_KEY environment variable is required")]
    MissingSecretKey,
    #[error("PAYMENTS_WEBHOOK_SECRET environment variable is required")]
    MissingWebhookSecret,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mock_builds_valid_config() {
        let cfg = GatewayConfig::local_mock("http://127.0.0.1:9100", "sk_test", "whsec_test").unwrap();
        assert_eq!(cfg.secret_key.as_str(), "sk_test");
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.api_url.as_str(), "http://127.0.0.1:9100/");
        assert_eq!(cfg.webhook_tolerance_secs, 300);
    }

    #[test]
    fn debug_redacts_secrets() {
        let cfg = GatewayConfig::local_mock("http://127.0.0.1:9100", "sk_live_abc", "whsec_xyz").unwrap();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("sk_live_abc"));
        assert!(!debug.contains("whsec_xyz"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn env_url_uses_default_when_var_absent() {
        let url = env_url("FIXMATE_NONEXISTENT_VAR_7781", "https://example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn env_url_rejects_invalid_url() {
        std::env::set_var("FIXMATE_TEST_BAD_URL_GW", "not a url");
        let result = env_url("FIXMATE_TEST_BAD_URL_GW", "https://example.com");
        std::env::remove_var("FIXMATE_TEST_BAD_URL_GW");
        assert!(result.is_err());
    }
}
