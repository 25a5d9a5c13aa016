//! Shared application state

use std::sync::Arc;

use crate::{
    auth::{AuthState, JwtManager},
    config::Config,
    fanout::{FanoutDispatcher, FanoutQueue},
    presence::{ConnectionRegistry, PresenceManager},
    store::Store,
    websocket::WebSocketState,
};

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub jwt_manager: JwtManager,
    pub presence: PresenceManager,
    pub fanout: FanoutQueue,
    pub ws_state: WebSocketState,
}

impl AppState {
    /// Wire the presence registry, the local connection set and the fanout
    /// workers together.
    ///
    /// Spawns the fanout shard workers, so it must be called inside a Tokio runtime.
    pub fn new(config: Config, store: Arc<dyn Store>, registry: Arc<dyn ConnectionRegistry>) -> Self {
        let jwt_manager = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);
        let presence = PresenceManager::new(registry);
        let ws_state = WebSocketState::new();

        let dispatcher = FanoutDispatcher::new(presence.clone(), Arc::new(ws_state.clone()));
        let fanout = FanoutQueue::spawn(dispatcher, config.fanout_shards);

        Self {
            config: Arc::new(config),
            store,
            jwt_manager,
            presence,
            fanout,
            ws_state,
        }
    }

    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt_manager: self.jwt_manager.clone(),
        }
    }
}
