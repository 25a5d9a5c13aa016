//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    auth::{CredentialsError, JwtError, PasswordError},
    store::StoreError,
};

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid or expired recovery code")]
    InvalidOtp,

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Resource errors
    #[error("Resource not found")]
    NotFound,
    #[error("Resource already exists")]
    Conflict(String),

    // Internal errors
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // Authentication
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", self.to_string()),
            ApiError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", self.to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::InvalidOtp => (StatusCode::UNAUTHORIZED, "INVALID_OTP", self.to_string()),

            // Validation
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),

            // Resources
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),

            // Internal
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR", "Database error".to_string()),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", self.to_string()),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound,
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                ApiError::Database(msg)
            }
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Encoding(msg) => {
                tracing::error!(error = %msg, "Token encoding failed");
                ApiError::Internal
            }
            _ => ApiError::InvalidToken,
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        tracing::error!(error = %err, "Password hashing error");
        ApiError::Internal
    }
}

impl From<CredentialsError> for ApiError {
    fn from(err: CredentialsError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ApiError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (ApiError::NotFound, StatusCode::NOT_FOUND),
            (ApiError::Conflict("taken".into()), StatusCode::CONFLICT),
            (ApiError::Database("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::InvalidOtp, StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_store_errors_map() {
        assert!(matches!(
            ApiError::from(StoreError::NotFound("message".into())),
            ApiError::NotFound
        ));
        assert!(matches!(
            ApiError::from(StoreError::Conflict("username".into())),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(JwtError::Expired),
            ApiError::InvalidToken
        ));
    }
}
