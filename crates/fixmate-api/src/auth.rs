//! # Authentication Middleware
//!
//! Bearer tokens encode the caller's role and uid:
//!
//! ```text
//! Bearer {role}:{uid}:{secret}
//! ```
//!
//! Roles are `customer`, `pro`, `admin` and `system`. The secret is compared
//! in constant time against the configured shared secret. Every
//! authenticated request gets a [`CallerIdentity`] in its extensions;
//! handlers extract it through the `FromRequestParts` impl.
//!
//! With no secret configured (local development) the secret segment is not
//! checked, but the role and uid must still be present.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fixmate_core::ErrorKind;
use fixmate_escrow::{Actor, Caller};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use zeroize::Zeroizing;

use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── Role ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Pro,
    Admin,
    /// The scheduler or another trusted backend job.
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Pro => "pro",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Self::Customer),
            "pro" => Some(Self::Pro),
            "admin" => Some(Self::Admin),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub role: Role,
    pub uid: String,
}

impl CallerIdentity {
    /// The engine-level caller. Only the `admin` role carries the admin claim.
    pub fn caller(&self) -> Caller {
        match self.role {
            Role::Admin => Caller::admin(self.uid.as_str()),
            _ => Caller::user(self.uid.as_str()),
        }
    }

    /// The engine-level actor. `system` callers act as the scheduler.
    pub fn actor(&self) -> Actor {
        match self.role {
            Role::System => Actor::System,
            _ => Actor::User(self.caller()),
        }
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Reject callers that are not the scheduler.
pub fn require_system(caller: &CallerIdentity) -> Result<(), AppError> {
    if caller.role == Role::System {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role 'system' required, caller has '{}'",
            caller.role.as_str()
        )))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of secrets. A length mismatch still performs a
/// comparison so timing does not reveal the expected length.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse `{role}:{uid}:{secret}`. `expected_secret` of `None` skips the
/// secret check.
pub fn parse_bearer_token(
    provided: &str,
    expected_secret: Option<&str>,
) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();
    let [role_str, uid, secret] = parts.as_slice() else {
        return Err("invalid token format, expected {role}:{uid}:{secret}".into());
    };

    if let Some(expected) = expected_secret {
        if !constant_time_token_eq(secret, expected) {
            return Err("invalid bearer token".into());
        }
    }

    let role = Role::parse(role_str).ok_or_else(|| format!("unknown role: {role_str}"))?;
    if uid.trim().is_empty() {
        return Err("token uid must not be empty".into());
    }

    Ok(CallerIdentity {
        role,
        uid: uid.to_string(),
    })
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the Bearer token and inject [`CallerIdentity`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let secret = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|c| c.secret.clone());

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(header_value) if header_value.starts_with("Bearer ") => {
            let provided = &header_value[7..];
            match parse_bearer_token(provided, secret.as_ref().map(|s| s.as_str())) {
                Ok(identity) => {
                    request.extensions_mut().insert(identity);
                    next.run(request).await
                }
                Err(msg) => {
                    tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                    unauthorized_response(&msg)
                }
            }
        }
        Some(_) => {
            tracing::warn!("authentication failed: non-Bearer authorization scheme");
            unauthorized_response("authorization header must use Bearer scheme")
        }
        None => unauthorized_response("missing authorization header"),
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: ErrorKind::Unauthenticated.as_str().to_string(),
            message: message.to_string(),
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
