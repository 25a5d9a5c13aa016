//! Account signup and login

use axum::{extract::State, http::StatusCode, Json};
use clipsync_shared::Message;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    auth::{hash_password, validate_credentials, verify_password},
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
    pub username: String,
    pub messages: Vec<Message>,
    #[serde(with = "time::serde::rfc3339")]
    pub date_joined: OffsetDateTime,
}

/// Create an account
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    validate_credentials(&req.username, &req.password)?;
    let username = req.username.trim();

    let password_hash = hash_password(&req.password)?;
    let account = state
        .store
        .create_account(username, &password_hash)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::Conflict("Username is already taken".to_string()),
            other => other,
        })?;

    tracing::info!(account_id = %account.id, username = %account.username, "Account registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Account created".to_string(),
        }),
    ))
}

/// Log in and receive a bearer token along with the account's messages
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let account = state
        .store
        .find_account_by_username(req.username.trim())
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&req.password, &account.password_hash)? {
        tracing::debug!(account_id = %account.id, "login: password mismatch");
        return Err(ApiError::InvalidCredentials);
    }

    let (token, jti) = state.jwt_manager.generate_token(account.id, &account.username)?;
    let messages = state.store.list_messages(account.id).await?;

    tracing::info!(account_id = %account.id, jti = %jti, "Account logged in");

    Ok(Json(LoginResponse {
        message: "Logged in".to_string(),
        token,
        expires_in: state.jwt_manager.expiry_seconds(),
        username: account.username,
        messages,
        date_joined: account.date_joined,
    }))
}
