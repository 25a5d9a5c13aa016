//! WebSocket connection lifecycle
//!
//! A connection moves `Unauthenticated -> Registered -> Closed`. The account id
//! is captured at registration and reused for deregistration, since the token
//! may have expired by the time the connection closes.

use clipsync_shared::AccountId;
use tokio::sync::mpsc;

use super::events::ServerEvent;
use crate::presence::{ConnectionHandle, PresenceError, PresenceManager, Removal};

/// Outbound events buffered per connection before new ones are dropped
pub const OUTBOUND_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, no account bound
    Unauthenticated,
    /// In the account's presence set
    Registered { account_id: AccountId },
    /// Terminal
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("Connection is closed")]
    Closed,
    #[error("Connection is already registered to another account")]
    AlreadyBound,
    #[error(transparent)]
    Presence(#[from] PresenceError),
}

/// Represents an active WebSocket connection
#[derive(Debug)]
pub struct Connection {
    /// Unique handle for this connection
    pub handle: ConnectionHandle,

    state: ConnectionState,

    /// Account of a failed registration whose rollback also failed; `close`
    /// retries the removal
    unconfirmed: Option<AccountId>,

    /// Channel to send events to this connection
    sender: mpsc::Sender<ServerEvent>,
}

impl Connection {
    /// Create a new, unauthenticated connection
    pub fn new(sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            handle: ConnectionHandle::new(),
            state: ConnectionState::Unauthenticated,
            unconfirmed: None,
            sender,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn account_id(&self) -> Option<AccountId> {
        match self.state {
            ConnectionState::Registered { account_id } => Some(account_id),
            _ => None,
        }
    }

    /// Send an event to this connection
    ///
    /// Returns Err if the connection is closed or its buffer is full
    #[allow(clippy::result_large_err)] // Error type is from tokio mpsc, containing the failed event
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::TrySendError<ServerEvent>> {
        self.sender.try_send(event)
    }

    /// Bind this connection to `account_id` and add it to the presence set
    ///
    /// Registering again for the same account is a no-op. On a registry
    /// failure the connection stays unauthenticated and the handle is removed
    /// again, since the add may have been applied before the error.
    pub async fn register(
        &mut self,
        account_id: AccountId,
        presence: &PresenceManager,
    ) -> Result<(), RegisterError> {
        match self.state {
            ConnectionState::Closed => return Err(RegisterError::Closed),
            ConnectionState::Registered { account_id: bound } if bound == account_id => {
                return Ok(())
            }
            ConnectionState::Registered { .. } => return Err(RegisterError::AlreadyBound),
            ConnectionState::Unauthenticated => {}
        }

        if let Err(e) = presence.register(account_id, self.handle).await {
            if let Err(undo) = presence.deregister(account_id, self.handle).await {
                self.unconfirmed = Some(account_id);
                tracing::warn!(
                    error = %undo,
                    account_id = %account_id,
                    handle = %self.handle,
                    "Could not roll back failed registration"
                );
            }
            return Err(e.into());
        }
        if self.unconfirmed == Some(account_id) {
            self.unconfirmed = None;
        }
        self.state = ConnectionState::Registered { account_id };
        Ok(())
    }

    /// Move to `Closed`, deregistering if the connection was registered
    ///
    /// Only the first call deregisters. A handle left behind by a failed
    /// registration is removed here too. Registry failures are logged, the
    /// connection is closed regardless.
    pub async fn close(&mut self, presence: &PresenceManager) -> Option<Removal> {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Closed);
        let registered = match previous {
            ConnectionState::Registered { account_id } => Some(account_id),
            _ => None,
        };
        let stale = self.unconfirmed.take().filter(|a| Some(*a) != registered);

        let mut removal = None;
        if let Some(account_id) = registered {
            removal = self.deregister(account_id, presence).await;
        }
        if let Some(account_id) = stale {
            let stale_removal = self.deregister(account_id, presence).await;
            removal = removal.or(stale_removal);
        }
        removal
    }

    async fn deregister(&self, account_id: AccountId, presence: &PresenceManager) -> Option<Removal> {
        match presence.deregister(account_id, self.handle).await {
            Ok(removal) => Some(removal),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    account_id = %account_id,
                    handle = %self.handle,
                    "Connection closed but deregistration failed"
                );
                None
            }
        }
    }
}
