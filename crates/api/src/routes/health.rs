//! Health check endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: ComponentHealth,
    pub presence: ComponentHealth,
    pub active_connections: usize,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub backend: &'static str,
    pub status: &'static str,
}

fn status_of(ok: bool) -> &'static str {
    if ok {
        "healthy"
    } else {
        "unhealthy"
    }
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_ok = state.store.health_check().await.is_ok();
    let presence_ok = state.presence.health().await.is_ok();
    let stats = state.ws_state.get_stats().await;

    let overall_status = if db_ok && presence_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        overall_status,
        Json(HealthResponse {
            status: status_of(overall_status == StatusCode::OK).to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: ComponentHealth {
                backend: state.store.backend_name(),
                status: status_of(db_ok),
            },
            presence: ComponentHealth {
                backend: state.presence.backend_name(),
                status: status_of(presence_ok),
            },
            active_connections: stats.active_connections,
        }),
    )
}

/// Liveness check (just returns 200 if the server is running)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness check (checks if the service is ready to accept traffic)
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.store.health_check().await.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    match state.presence.health().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
