//! # Custom Extractors & Validation
//!
//! Helpers mapping axum body rejections onto [`AppError`] so every failure
//! uses the same JSON error body.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Request types with checks beyond what serde enforces.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to
/// [`AppError::Validation`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::Validation(err.body_text()))
}

/// Extract a JSON body and run its [`Validate`] checks.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Decode an optional JSON body. An empty or all-whitespace body yields
/// `T::default()`; anything else must be valid JSON for `T`.
pub fn extract_optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Failed to deserialize the JSON body: {e}")))
}
