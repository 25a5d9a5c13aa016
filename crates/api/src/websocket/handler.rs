//! WebSocket handler for Axum
//!
//! Handles WebSocket connections, registration, and event delivery.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::Response,
};
use clipsync_shared::AccountId;
use futures::{stream::StreamExt, SinkExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::state::AppState;

use super::{
    connection::{Connection, RegisterError, OUTBOUND_BUFFER},
    events::{ClientEvent, ServerEvent},
};

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: Option<String>,
}

/// WebSocket handler - upgrades HTTP connection to WebSocket
///
/// A token in the query string registers the connection right away and is
/// rejected with 401 before the upgrade if invalid. Without one, the client
/// registers later with a `register` event. The token is checked before the
/// upgrade headers, so plain HTTP requests see the 401 too.
pub async fn ws_handler(
    State(app_state): State<AppState>,
    Query(params): Query<WebSocketQuery>,
    ws: Option<WebSocketUpgrade>,
) -> Result<Response, StatusCode> {
    let account_id = match params.token.as_deref() {
        Some(token) => match app_state.jwt_manager.verify(token) {
            Ok(account_id) => Some(account_id),
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket auth failed: invalid token");
                return Err(StatusCode::UNAUTHORIZED);
            }
        },
        None => None,
    };

    let Some(ws) = ws else {
        return Err(StatusCode::UPGRADE_REQUIRED);
    };

    tracing::debug!(preauthenticated = account_id.is_some(), "WebSocket connection upgrade requested");

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, account_id, app_state)))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, account_id: Option<AccountId>, app_state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Create channel for sending events to this connection
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(OUTBOUND_BUFFER);

    let mut conn = Connection::new(tx.clone());
    let handle = conn.handle;
    let ws_state = app_state.ws_state.clone();
    ws_state.attach(handle, tx).await;

    let _ = conn.send(ServerEvent::Connected { handle });

    // Spawn task to send messages to client
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize WebSocket event");
                }
            }
        }
    });

    if let Some(account_id) = account_id {
        complete_registration(&mut conn, account_id, &app_state).await;
    }

    let mut shutdown = ws_state.shutdown_signal();
    if !*shutdown.borrow_and_update() {
        loop {
            tokio::select! {
                msg = receiver.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_event(&text, &mut conn, &app_state).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(handle = %handle, "WebSocket close received");
                        break;
                    }
                    Some(Ok(_)) => {} // Ping/pong handled by axum, binary ignored
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, handle = %handle, "WebSocket receive error");
                        break;
                    }
                },
                _ = &mut send_task => {
                    tracing::debug!(handle = %handle, "WebSocket writer stopped");
                    break;
                }
                _ = shutdown.changed() => {
                    tracing::debug!(handle = %handle, "Server shutting down, closing connection");
                    break;
                }
            }
        }
    }

    // Cleanup on disconnect
    tracing::info!(
        handle = %handle,
        account_id = ?conn.account_id(),
        "WebSocket connection closing"
    );
    conn.close(&app_state.presence).await;
    ws_state.detach(&handle).await;
    send_task.abort();
}

/// Handle one text frame from the client
async fn handle_client_event(text: &str, conn: &mut Connection, app_state: &AppState) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = ?e, handle = %conn.handle, "Failed to parse client event");
            let _ = conn.send(ServerEvent::Error {
                message: "Invalid event format".to_string(),
            });
            return;
        }
    };

    match event {
        ClientEvent::Register { token } => match app_state.jwt_manager.verify(&token) {
            Ok(account_id) => complete_registration(conn, account_id, app_state).await,
            Err(e) => {
                tracing::debug!(error = %e, handle = %conn.handle, "Registration token rejected");
                let _ = conn.send(ServerEvent::RegistrationError {
                    message: e.to_string(),
                });
            }
        },

        ClientEvent::Ping => {
            let _ = conn.send(ServerEvent::Pong);
        }
    }
}

/// Register a verified account for this connection
///
/// Accounts that no longer exist are skipped without telling the client.
async fn complete_registration(conn: &mut Connection, account_id: AccountId, app_state: &AppState) {
    match app_state.store.find_account(account_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::warn!(
                account_id = %account_id,
                handle = %conn.handle,
                "Token names an unknown account, connection left unregistered"
            );
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, account_id = %account_id, "Account lookup failed during registration");
            let _ = conn.send(ServerEvent::RegistrationError {
                message: "Registration unavailable".to_string(),
            });
            return;
        }
    }

    match conn.register(account_id, &app_state.presence).await {
        Ok(()) => {
            let _ = conn.send(ServerEvent::Registered { account_id });
        }
        Err(RegisterError::AlreadyBound) => {
            let _ = conn.send(ServerEvent::Error {
                message: "Connection is already registered to another account".to_string(),
            });
        }
        Err(e) => {
            let _ = conn.send(ServerEvent::RegistrationError {
                message: e.to_string(),
            });
        }
    }
}
