//! Message creation and deletion
//!
//! Both handlers persist first and only then hand the change to the fanout
//! queue, so a failed write is never announced to devices.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use clipsync_shared::{Message, MessageId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    fanout::MessageEvent,
    state::AppState,
};

pub const MAX_MESSAGE_LENGTH: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct CreateMessageResponse {
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct DeleteMessageResponse {
    pub id: MessageId,
}

/// Store a message and push it to every live device of the account
pub async fn create_message(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<CreateMessageRequest>,
) -> ApiResult<Json<CreateMessageResponse>> {
    if req.text.len() > MAX_MESSAGE_LENGTH {
        return Err(ApiError::Validation(format!(
            "Message must be at most {} bytes",
            MAX_MESSAGE_LENGTH
        )));
    }

    let message = state
        .store
        .create_message(auth_user.account_id, &req.text)
        .await?;

    tracing::debug!(
        account_id = %auth_user.account_id,
        message_id = %message.id,
        "Message created"
    );

    state
        .fanout
        .enqueue(message.account_id, MessageEvent::Created(message.clone()));

    Ok(Json(CreateMessageResponse { message }))
}

/// Delete one of the caller's messages and notify the account's devices
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteMessageResponse>> {
    let deleted = state
        .store
        .delete_message(auth_user.account_id, MessageId(id))
        .await?;

    tracing::debug!(
        account_id = %deleted.account_id,
        message_id = %deleted.id,
        "Message deleted"
    );

    state
        .fanout
        .enqueue(deleted.account_id, MessageEvent::Deleted(deleted.id));

    Ok(Json(DeleteMessageResponse { id: deleted.id }))
}
