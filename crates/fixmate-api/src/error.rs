//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Escrow and dispute failures carry an [`ErrorKind`]; the kind picks the
//! HTTP status and is the `code` of the JSON body. Server-fault messages
//! are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fixmate_core::ErrorKind;
use fixmate_escrow::EscrowError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Kebab-case error kind (e.g. "failed-precondition").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Failure reported by the escrow or dispute engine.
    #[error(transparent)]
    Escrow(#[from] EscrowError),

    /// Request body or path could not be parsed.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Missing or invalid credentials.
    #[error("unauthenticated: {0}")]
    Unauthorized(String),

    /// Caller lacks the role the route requires.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Unexpected server-side failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Escrow(e) => e.kind(),
            Self::Validation(_) => ErrorKind::InvalidArgument,
            Self::Unauthorized(_) => ErrorKind::Unauthenticated,
            Self::Forbidden(_) => ErrorKind::PermissionDenied,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status and machine-readable code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        let kind = self.kind();
        (status_for(kind), kind.as_str())
    }
}

/// HTTP status for each error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::InvalidArgument => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::FailedPrecondition | ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::DeadlineExceeded => StatusCode::GONE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match self.kind() {
            ErrorKind::Internal => {
                tracing::error!(error = %self, "internal server error");
                "An internal error occurred".to_string()
            }
            ErrorKind::Unavailable => {
                tracing::error!(error = %self, "dependency unavailable");
                "A dependency is temporarily unavailable".to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixmate_core::{CaseId, JobId, PaymentId, Timestamp};
    use fixmate_escrow::{GatewayError, LedgerError};
    use http_body_util::BodyExt;

    #[test]
    fn kind_status_table() {
        let table = [
            (ErrorKind::Unauthenticated, 401),
            (ErrorKind::PermissionDenied, 403),
            (ErrorKind::InvalidArgument, 422),
            (ErrorKind::NotFound, 404),
            (ErrorKind::FailedPrecondition, 409),
            (ErrorKind::AlreadyExists, 409),
            (ErrorKind::DeadlineExceeded, 410),
            (ErrorKind::Internal, 500),
            (ErrorKind::Unavailable, 503),
        ];
        for (kind, status) in table {
            assert_eq!(status_for(kind).as_u16(), status, "{kind}");
        }
    }

    #[test]
    fn escrow_errors_keep_their_kind() {
        let err = AppError::from(EscrowError::DisputeAlreadyActive {
            job_id: JobId::new("job-1"),
            case_id: CaseId::new(),
        });
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "already-exists");

        let err = AppError::from(EscrowError::DisputeWindowClosed {
            payment_id: PaymentId::new("pi_1"),
            deadline: Timestamp::now(),
        });
        assert_eq!(err.status_and_code(), (StatusCode::GONE, "deadline-exceeded"));
    }

    #[test]
    fn validation_is_invalid_argument() {
        let err = AppError::Validation("missing field `amount`".into());
        assert_eq!(
            err.status_and_code(),
            (StatusCode::UNPROCESSABLE_ENTITY, "invalid-argument")
        );
    }

    #[tokio::test]
    async fn internal_message_is_hidden() {
        let err = AppError::from(EscrowError::from(LedgerError::Backend(
            "relation \"payments\" does not exist".into(),
        )));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "internal");
        assert!(!json["error"]["message"].as_str().unwrap().contains("relation"));
    }

    #[tokio::test]
    async fn unavailable_message_is_hidden() {
        let err = AppError::from(EscrowError::from(GatewayError::Transport {
            endpoint: "POST /v1/transfers".into(),
            message: "connection reset by 10.0.0.7".into(),
        }));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "unavailable");
        assert!(!json["error"]["message"].as_str().unwrap().contains("10.0.0.7"));
    }
}
