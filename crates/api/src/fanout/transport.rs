//! Connection transport seam
//!
//! The fanout path only needs to push one event to one handle. Whatever owns
//! the sockets implements this trait.

use async_trait::async_trait;

use super::event::MessageEvent;
use crate::presence::ConnectionHandle;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// No live connection with this handle in this process
    #[error("Connection {0} is not attached")]
    Gone(ConnectionHandle),
    /// The connection exists but its outbound channel is closed
    #[error("Connection {0} is closed")]
    Closed(ConnectionHandle),
    /// The connection's outbound buffer is full; the event is dropped
    #[error("Connection {0} is not keeping up")]
    Backpressure(ConnectionHandle),
}

/// Delivery of events to individual connections
#[async_trait]
pub trait ConnectionTransport: Send + Sync {
    async fn send(&self, handle: ConnectionHandle, event: &MessageEvent)
        -> Result<(), DeliveryError>;
}
