//! Password recovery with one-time codes
//!
//! There is no delivery channel for the code yet; it is only written to the
//! debug log.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    auth::{generate_otp, hash_password, validate_credentials, OTP_TTL},
    error::{ApiError, ApiResult},
    state::AppState,
    store::StoreError,
};

#[derive(Debug, Deserialize)]
pub struct OtpSendRequest {
    #[serde(alias = "email")]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpVerifyRequest {
    #[serde(alias = "email")]
    pub username: String,
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpChangePasswordRequest {
    #[serde(alias = "email")]
    pub username: String,
    pub otp: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RecoveryResponse {
    pub message: String,
}

/// Issue a recovery code for an account
pub async fn otp_send(
    State(state): State<AppState>,
    Json(req): Json<OtpSendRequest>,
) -> ApiResult<Json<RecoveryResponse>> {
    let username = req.username.trim();
    let otp = generate_otp();
    let expires_at = OffsetDateTime::now_utc() + OTP_TTL;

    state.store.set_otp(username, &otp, expires_at).await?;

    tracing::debug!(username = %username, otp = %otp, "Recovery code issued");

    Ok(Json(RecoveryResponse {
        message: "Recovery code issued".to_string(),
    }))
}

/// Check a recovery code without consuming it
pub async fn otp_verify(
    State(state): State<AppState>,
    Json(req): Json<OtpVerifyRequest>,
) -> ApiResult<Json<RecoveryResponse>> {
    let account = state
        .store
        .find_account_by_username(req.username.trim())
        .await?
        .ok_or(ApiError::InvalidOtp)?;

    if !account.otp_matches(&req.otp, OffsetDateTime::now_utc()) {
        return Err(ApiError::InvalidOtp);
    }

    Ok(Json(RecoveryResponse {
        message: "Recovery code verified".to_string(),
    }))
}

/// Set a new password using a recovery code, which is consumed
pub async fn otp_change_password(
    State(state): State<AppState>,
    Json(req): Json<OtpChangePasswordRequest>,
) -> ApiResult<Json<RecoveryResponse>> {
    validate_credentials(&req.username, &req.password)?;
    let username = req.username.trim();

    let password_hash = hash_password(&req.password)?;
    state
        .store
        .reset_password(username, &req.otp, &password_hash, OffsetDateTime::now_utc())
        .await
        .map_err(|e| match e {
            StoreError::NotFound(_) => ApiError::InvalidOtp,
            other => ApiError::from(other),
        })?;

    tracing::info!(username = %username, "Password reset with recovery code");

    Ok(Json(RecoveryResponse {
        message: "Password changed".to_string(),
    }))
}
