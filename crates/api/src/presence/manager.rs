//! Presence manager
//!
//! Owns the register/deregister/lookup protocol over an injected
//! [`ConnectionRegistry`].
//!
//! Failure policy: registration and deregistration surface registry errors to
//! the caller, while lookups fail open to an empty set so that publishers are
//! never blocked by an unavailable registry.

use std::collections::HashSet;
use std::sync::Arc;

use clipsync_shared::AccountId;

use super::registry::{ConnectionHandle, ConnectionRegistry, RegistryError, Removal};

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("Presence registry unavailable: {0}")]
    RegistryUnavailable(#[from] RegistryError),
}

/// Register/deregister protocol for live connections
#[derive(Clone)]
pub struct PresenceManager {
    registry: Arc<dyn ConnectionRegistry>,
}

impl PresenceManager {
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Add a handle to the account's presence set (idempotent)
    pub async fn register(
        &self,
        account_id: AccountId,
        handle: ConnectionHandle,
    ) -> Result<(), PresenceError> {
        let added = self.registry.add(account_id, handle).await.map_err(|e| {
            tracing::error!(
                error = %e,
                account_id = %account_id,
                handle = %handle,
                "Failed to register connection"
            );
            e
        })?;

        if added {
            tracing::info!(account_id = %account_id, handle = %handle, "Connection registered");
        } else {
            tracing::debug!(
                account_id = %account_id,
                handle = %handle,
                "Connection already registered"
            );
        }

        Ok(())
    }

    /// Remove a handle; the registry deletes the entry if it was the last one
    pub async fn deregister(
        &self,
        account_id: AccountId,
        handle: ConnectionHandle,
    ) -> Result<Removal, PresenceError> {
        let removal = self.registry.remove(account_id, handle).await.map_err(|e| {
            tracing::error!(
                error = %e,
                account_id = %account_id,
                handle = %handle,
                "Failed to deregister connection"
            );
            e
        })?;

        match removal {
            Removal::EntryDeleted => tracing::info!(
                account_id = %account_id,
                handle = %handle,
                "Last connection deregistered, account offline"
            ),
            Removal::Removed { remaining } => tracing::info!(
                account_id = %account_id,
                handle = %handle,
                remaining,
                "Connection deregistered"
            ),
            Removal::Absent => tracing::debug!(
                account_id = %account_id,
                handle = %handle,
                "Deregistered handle was not present"
            ),
        }

        Ok(removal)
    }

    /// Snapshot of the account's live handles
    ///
    /// May be stale by the time the caller uses it. An unavailable registry
    /// yields an empty set.
    pub async fn live_handles(&self, account_id: AccountId) -> HashSet<ConnectionHandle> {
        match self.registry.members(account_id).await {
            Ok(handles) => handles,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    account_id = %account_id,
                    "Presence lookup failed, treating account as offline"
                );
                HashSet::new()
            }
        }
    }

    /// Round trip to the registry, for health checks
    pub async fn health(&self) -> Result<(), PresenceError> {
        self.registry.ping().await?;
        Ok(())
    }

    pub fn backend_name(&self) -> &'static str {
        self.registry.backend_name()
    }
}
