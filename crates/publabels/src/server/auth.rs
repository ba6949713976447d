use axum::http::HeaderMap;

use publabels_core::Address;

use super::error::AppError;

pub(super) fn check_auth(expected_token: &str, headers: &HeaderMap) -> Result<(), AppError> {
    let token = headers
        .get("x-api-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if token != expected_token {
        return Err(AppError::Unauthorized(
            "invalid or missing X-API-Token".to_string(),
        ));
    }
    Ok(())
}

/// The account a mutating request acts as, taken from `X-Caller`.
pub(super) fn caller_from_headers(headers: &HeaderMap) -> Result<Address, AppError> {
    let raw = headers
        .get("x-caller")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing X-Caller header".to_string()))?;

    raw.parse::<Address>()
        .map_err(|e| AppError::BadRequest(format!("invalid X-Caller: {e}")))
}
