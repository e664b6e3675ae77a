//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use axum::extract::rejection::JsonRejection;
use tracing::{debug, error};
use warden_core::auth::AuthError;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Internal(detail) => {
                error!(%detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::DuplicateUsername => AppError::Validation("Username already taken".into()),
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::InvalidCredentials => AppError::Unauthorized("Invalid credentials".into()),
            AuthError::InvalidRefreshToken => {
                AppError::Unauthorized("Invalid refresh token".into())
            }
            AuthError::Unauthenticated => AppError::Unauthorized("Invalid or expired token".into()),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// Malformed or incomplete request bodies. The parser detail is logged, not returned.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(detail = %rejection.body_text(), "request body rejected");
        AppError::Validation("Invalid request body".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_expected_status() {
        let cases = [
            (AuthError::DuplicateUsername, StatusCode::BAD_REQUEST),
            (AuthError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidRefreshToken, StatusCode::UNAUTHORIZED),
            (AuthError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (AuthError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            let resp = AppError::from(err).into_response();
            assert_eq!(resp.status(), status);
        }
    }
}
