//! API routes

pub mod auth;
pub mod health;
pub mod messages;
pub mod recovery;
pub mod users;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth::require_auth, state::AppState, websocket::ws_handler};

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Public API routes (no auth required) - under /api/v1
    let public_api_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/otp-send", post(recovery::otp_send))
        .route("/auth/otp-verify", post(recovery::otp_verify))
        .route("/auth/otp-change-password", post(recovery::otp_change_password));

    let protected_api_routes = Router::new()
        .route("/user-data", get(users::user_data).post(users::user_data))
        .route("/messages", post(messages::create_message))
        .route("/messages/:id", delete(messages::delete_message))
        .layer(middleware::from_fn_with_state(auth_state, require_auth));

    // WebSocket routes (auth handled in handler via query parameter or register event)
    let websocket_routes = Router::new().route("/ws", get(ws_handler));

    let api_v1_routes = Router::new()
        .merge(public_api_routes)
        .merge(protected_api_routes)
        .merge(websocket_routes);

    let cors = cors_layer(&state.config.cors_origin);

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", api_v1_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            tracing::warn!(error = %e, origin = %origin, "Invalid CORS_ORIGIN, cross-origin requests disabled");
            layer
        }
    }
}
