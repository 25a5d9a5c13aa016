//! Redis-backed connection registry
//!
//! Each account's presence set is a Redis SET under `presence:{account_id}`.
//! Deregistration runs as a Lua script so the "last member deletes the key"
//! decision and the removal happen in one atomic step on the server.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ::redis::{aio::ConnectionManager, AsyncCommands, RedisResult, Script};
use async_trait::async_trait;
use clipsync_shared::AccountId;

use super::registry::{
    ConnectionHandle, ConnectionRegistry, RegistryError, RegistryResult, Removal,
};

const KEY_PREFIX: &str = "presence";

/// Returns -1 when the handle is not a member, 0 when the entry was deleted,
/// otherwise the number of handles left.
const DEREGISTER_SCRIPT: &str = r#"
if redis.call('SISMEMBER', KEYS[1], ARGV[1]) == 0 then
    return -1
end
if redis.call('SCARD', KEYS[1]) == 1 then
    redis.call('DEL', KEYS[1])
    return 0
end
redis.call('SREM', KEYS[1], ARGV[1])
return redis.call('SCARD', KEYS[1])
"#;

/// Presence sets stored in a shared Redis instance
#[derive(Clone)]
pub struct RedisRegistry {
    conn: ConnectionManager,
    deregister: Arc<Script>,
    timeout: Duration,
}

impl RedisRegistry {
    /// Connect to Redis; every later round trip is bounded by `timeout`
    pub async fn connect(url: &str, timeout: Duration) -> RegistryResult<Self> {
        let client = ::redis::Client::open(url)?;
        let conn = match tokio::time::timeout(timeout, ConnectionManager::new(client)).await {
            Ok(conn) => conn?,
            Err(_) => return Err(RegistryError::Timeout),
        };

        Ok(Self {
            conn,
            deregister: Arc::new(Script::new(DEREGISTER_SCRIPT)),
            timeout,
        })
    }

    fn key(account_id: AccountId) -> String {
        format!("{KEY_PREFIX}:{account_id}")
    }

    async fn bounded<T, F>(&self, fut: F) -> RegistryResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(RegistryError::from),
            Err(_) => Err(RegistryError::Timeout),
        }
    }
}

#[async_trait]
impl ConnectionRegistry for RedisRegistry {
    async fn add(&self, account_id: AccountId, handle: ConnectionHandle) -> RegistryResult<bool> {
        let mut conn = self.conn.clone();
        let added: i64 = self
            .bounded(conn.sadd(Self::key(account_id), handle.to_string()))
            .await?;
        Ok(added == 1)
    }

    async fn remove(
        &self,
        account_id: AccountId,
        handle: ConnectionHandle,
    ) -> RegistryResult<Removal> {
        let mut conn = self.conn.clone();
        let mut invocation = self.deregister.prepare_invoke();
        invocation.key(Self::key(account_id)).arg(handle.to_string());

        let outcome: i64 = self.bounded(invocation.invoke_async(&mut conn)).await?;
        Ok(match outcome {
            n if n < 0 => Removal::Absent,
            0 => Removal::EntryDeleted,
            n => Removal::Removed {
                remaining: n as usize,
            },
        })
    }

    async fn members(&self, account_id: AccountId) -> RegistryResult<HashSet<ConnectionHandle>> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = self.bounded(conn.smembers(Self::key(account_id))).await?;

        Ok(raw
            .iter()
            .filter_map(|member| {
                let handle = ConnectionHandle::parse(member);
                if handle.is_none() {
                    tracing::warn!(
                        account_id = %account_id,
                        member = %member,
                        "Ignoring malformed handle in presence set"
                    );
                }
                handle
            })
            .collect())
    }

    async fn ping(&self) -> RegistryResult<()> {
        let mut conn = self.conn.clone();
        let _: String = self
            .bounded(::redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
