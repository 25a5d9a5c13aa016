//! Bearer token authentication for protected routes

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use clipsync_shared::AccountId;

use super::JwtManager;
use crate::error::ApiError;

/// State needed by the auth middleware
#[derive(Clone)]
pub struct AuthState {
    pub jwt_manager: JwtManager,
}

/// Authenticated account, inserted as a request extension by [`require_auth`]
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account_id: AccountId,
    pub username: String,
}

/// Require a valid `Authorization: Bearer <token>` header
pub async fn require_auth(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer)
        .ok_or(ApiError::Unauthorized)?;

    let claims = auth_state.jwt_manager.validate_token(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        ApiError::InvalidToken
    })?;

    request.extensions_mut().insert(AuthUser {
        account_id: AccountId(claims.sub),
        username: claims.username,
    });

    Ok(next.run(request).await)
}

fn extract_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
