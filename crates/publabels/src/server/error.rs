use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use publabels_core::RegistryError;

// ==============================================================================
// Error Type
// ==============================================================================

pub(crate) enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub(super) fn map_registry_error(err: RegistryError) -> AppError {
    match err {
        RegistryError::Unauthorized { .. } => AppError::Forbidden(err.to_string()),
        RegistryError::LengthMismatch { .. } | RegistryError::InvalidChangeId { .. } => {
            AppError::BadRequest(err.to_string())
        }
        RegistryError::Core(core) => {
            tracing::error!(error = %core, "registry persistence failed");
            AppError::Internal(format!("registry persistence failed: {core}"))
        }
    }
}
