//! Account data for the logged-in user

use axum::{extract::State, Extension, Json};
use clipsync_shared::Message;
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct UserDataResponse {
    pub messages: Vec<Message>,
    pub username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date_joined: OffsetDateTime,
}

/// Messages and profile of the authenticated account
pub async fn user_data(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<UserDataResponse>> {
    // Tokens can outlive the account they were issued for
    let account = state
        .store
        .find_account(auth_user.account_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let messages = state.store.list_messages(account.id).await?;

    Ok(Json(UserDataResponse {
        messages,
        username: account.username,
        date_joined: account.date_joined,
    }))
}
