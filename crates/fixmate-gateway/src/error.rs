//! Payment processor client error types.

use fixmate_escrow::GatewayError;

/// Errors from processor API calls.
#[derive(Debug, thiserror::Error)]
pub enum PaymentsApiError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Processor returned a non-2xx status.
    #[error("processor {endpoint} returned {status}: {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl From<PaymentsApiError> for GatewayError {
    fn from(err: PaymentsApiError) -> Self {
        match err {
            PaymentsApiError::Http { endpoint, source } => GatewayError::Transport {
                endpoint,
                message: source.to_string(),
            },
            PaymentsApiError::ApiError {
                endpoint,
                status,
                body,
            } => GatewayError::Rejected {
                endpoint,
                status,
                body,
            },
            PaymentsApiError::Deserialization { endpoint, source } => GatewayError::Decode {
                endpoint,
                message: source.to_string(),
            },
            PaymentsApiError::Config(e) => GatewayError::Transport {
                endpoint: "client_init".into(),
                message: e.to_string(),
            },
        }
    }
}
