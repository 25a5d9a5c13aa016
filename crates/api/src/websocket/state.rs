//! Global WebSocket state management
//!
//! Tracks the outbound channel of every connection accepted by this process
//! and implements [`ConnectionTransport`] on top of it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, RwLock};

use super::events::ServerEvent;
use crate::fanout::{ConnectionTransport, DeliveryError, MessageEvent};
use crate::presence::ConnectionHandle;

/// Global WebSocket state shared across all connections
#[derive(Clone)]
pub struct WebSocketState {
    /// Outbound channels indexed by connection handle
    connections: Arc<RwLock<HashMap<ConnectionHandle, mpsc::Sender<ServerEvent>>>>,

    /// Flipped to true when the server shuts down
    shutdown: Arc<watch::Sender<bool>>,
}

impl WebSocketState {
    /// Create new WebSocket state
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            shutdown: Arc::new(shutdown),
        }
    }

    /// Make a connection reachable by the transport
    pub async fn attach(&self, handle: ConnectionHandle, sender: mpsc::Sender<ServerEvent>) {
        let mut connections = self.connections.write().await;
        connections.insert(handle, sender);

        tracing::debug!(
            handle = %handle,
            total_connections = connections.len(),
            "WebSocket connection attached"
        );
    }

    /// Forget a connection
    pub async fn detach(&self, handle: &ConnectionHandle) {
        let mut connections = self.connections.write().await;
        if connections.remove(handle).is_some() {
            tracing::debug!(
                handle = %handle,
                remaining_connections = connections.len(),
                "WebSocket connection detached"
            );
        }
    }

    /// Get total number of attached connections
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    /// Receiver that observes server shutdown
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Signal every connection task to close and deregister
    pub fn close_all(&self) {
        self.shutdown.send_replace(true);
    }

    /// Get statistics about the WebSocket state
    pub async fn get_stats(&self) -> WebSocketStats {
        WebSocketStats {
            active_connections: self.connection_count().await,
        }
    }
}

impl Default for WebSocketState {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionTransport for WebSocketState {
    async fn send(
        &self,
        handle: ConnectionHandle,
        event: &MessageEvent,
    ) -> Result<(), DeliveryError> {
        let sender = {
            let connections = self.connections.read().await;
            connections.get(&handle).cloned()
        }
        .ok_or(DeliveryError::Gone(handle))?;

        sender
            .try_send(ServerEvent::Event(event.clone()))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DeliveryError::Backpressure(handle),
                mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed(handle),
            })
    }
}

/// Statistics about WebSocket connections
#[derive(Debug, Clone)]
pub struct WebSocketStats {
    /// Number of active connections
    pub active_connections: usize,
}
