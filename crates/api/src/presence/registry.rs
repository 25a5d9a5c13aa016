//! Connection registry contract
//!
//! A registry is pure state: account id -> set of connection handles.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use clipsync_shared::AccountId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for one live connection
///
/// Handles are random v4 UUIDs minted when a connection is accepted, so a
/// handle is never reused while anything still refers to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionHandle(pub Uuid);

impl ConnectionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a handle from its registry representation
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl Default for ConnectionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of an atomic removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The handle was not a member of the account's set
    Absent,
    /// The handle was removed and other handles remain
    Removed { remaining: usize },
    /// The handle was the sole member, so the whole entry was deleted
    EntryDeleted,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
    #[error("Registry operation timed out")]
    Timeout,
}

impl From<::redis::RedisError> for RegistryError {
    fn from(err: ::redis::RedisError) -> Self {
        RegistryError::Unavailable(err.to_string())
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Shared store of presence sets
///
/// Every method is a single round trip. `remove` must perform its
/// check-then-act atomically: if the handle is the only member, the entry is
/// deleted, otherwise just the handle is removed.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Add a handle to an account's set. Returns false if it was already there.
    async fn add(&self, account_id: AccountId, handle: ConnectionHandle) -> RegistryResult<bool>;

    /// Atomically remove a handle, deleting the entry when it was the last member.
    async fn remove(&self, account_id: AccountId, handle: ConnectionHandle)
        -> RegistryResult<Removal>;

    /// Snapshot of an account's set. A missing entry is an empty set.
    async fn members(&self, account_id: AccountId) -> RegistryResult<HashSet<ConnectionHandle>>;

    async fn ping(&self) -> RegistryResult<()>;

    fn backend_name(&self) -> &'static str;
}
