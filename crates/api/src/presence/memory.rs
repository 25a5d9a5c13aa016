//! In-memory connection registry
//!
//! Used for single-process deployments (no `REDIS_URL`) and in tests. Each
//! operation runs inside one lock acquisition, which is what makes `remove`
//! atomic.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use clipsync_shared::AccountId;
use tokio::sync::RwLock;

use super::registry::{ConnectionHandle, ConnectionRegistry, RegistryResult, Removal};

/// Presence sets held in process memory
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    /// Map of account_id -> live handles
    entries: Arc<RwLock<HashMap<AccountId, HashSet<ConnectionHandle>>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an entry exists for the account, empty or not
    pub async fn has_entry(&self, account_id: AccountId) -> bool {
        self.entries.read().await.contains_key(&account_id)
    }

    /// Number of accounts with an entry
    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl ConnectionRegistry for MemoryRegistry {
    async fn add(&self, account_id: AccountId, handle: ConnectionHandle) -> RegistryResult<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries.entry(account_id).or_default().insert(handle))
    }

    async fn remove(
        &self,
        account_id: AccountId,
        handle: ConnectionHandle,
    ) -> RegistryResult<Removal> {
        let mut entries = self.entries.write().await;
        let Some(handles) = entries.get_mut(&account_id) else {
            return Ok(Removal::Absent);
        };

        if !handles.contains(&handle) {
            return Ok(Removal::Absent);
        }

        if handles.len() == 1 {
            entries.remove(&account_id);
            return Ok(Removal::EntryDeleted);
        }

        handles.remove(&handle);
        Ok(Removal::Removed {
            remaining: handles.len(),
        })
    }

    async fn members(&self, account_id: AccountId) -> RegistryResult<HashSet<ConnectionHandle>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&account_id).cloned().unwrap_or_default())
    }

    async fn ping(&self) -> RegistryResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
