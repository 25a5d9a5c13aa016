//! In-memory store.
//!
//! Not durable: all state is lost on restart. Used when `DATABASE_URL` is unset
//! and by the test suites.

use super::{Store, StoreError, StoreResult};
use async_trait::async_trait;
use clipsync_shared::{Account, AccountId, Message, MessageId};
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    accounts: HashMap<AccountId, Account>,
    usernames: HashMap<String, AccountId>,
    messages: HashMap<AccountId, Vec<Message>>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_account(&self, username: &str, password_hash: &str) -> StoreResult<Account> {
        let mut inner = self.inner.write().await;
        if inner.usernames.contains_key(username) {
            return Err(StoreError::Conflict(format!("username {username} is taken")));
        }

        let account = Account {
            id: AccountId::new(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            date_joined: OffsetDateTime::now_utc(),
            otp: None,
            otp_expires_at: None,
        };
        inner.usernames.insert(account.username.clone(), account.id);
        inner.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_account_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        let inner = self.inner.read().await;
        Ok(inner
            .usernames
            .get(username)
            .and_then(|id| inner.accounts.get(id))
            .cloned())
    }

    async fn find_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.inner.read().await.accounts.get(&id).cloned())
    }

    async fn set_otp(&self, username: &str, otp: &str, expires_at: OffsetDateTime) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let id = *inner
            .usernames
            .get(username)
            .ok_or_else(|| StoreError::NotFound(format!("account {username}")))?;
        if let Some(account) = inner.accounts.get_mut(&id) {
            account.otp = Some(otp.to_string());
            account.otp_expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn reset_password(
        &self,
        username: &str,
        otp: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let id = *inner
            .usernames
            .get(username)
            .ok_or_else(|| StoreError::NotFound(format!("account {username}")))?;
        let account = inner
            .accounts
            .get_mut(&id)
            .filter(|account| account.otp_matches(otp, now))
            .ok_or_else(|| StoreError::NotFound("recovery code".to_string()))?;

        account.password_hash = password_hash.to_string();
        account.otp = None;
        account.otp_expires_at = None;
        Ok(())
    }

    async fn create_message(&self, account_id: AccountId, text: &str) -> StoreResult<Message> {
        let mut inner = self.inner.write().await;
        if !inner.accounts.contains_key(&account_id) {
            return Err(StoreError::NotFound(format!("account {account_id}")));
        }

        let message = Message::new(account_id, text);
        inner
            .messages
            .entry(account_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn delete_message(&self, account_id: AccountId, id: MessageId) -> StoreResult<Message> {
        let mut inner = self.inner.write().await;
        let messages = inner
            .messages
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::NotFound(format!("message {id}")))?;

        let index = messages
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("message {id}")))?;
        Ok(messages.remove(index))
    }

    async fn list_messages(&self, account_id: AccountId) -> StoreResult<Vec<Message>> {
        let inner = self.inner.read().await;
        let mut messages = inner.messages.get(&account_id).cloned().unwrap_or_default();
        // Appends are already in order; the stable sort only guards equal timestamps.
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let store = MemoryStore::new();
        store.create_account("alice", "hash").await.unwrap();

        let err = store.create_account("alice", "other").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_find_account_by_username_and_id() {
        let store = MemoryStore::new();
        let account = store.create_account("bob", "hash").await.unwrap();

        let by_name = store.find_account_by_username("bob").await.unwrap().unwrap();
        assert_eq!(by_name.id, account.id);
        assert!(store.find_account(account.id).await.unwrap().is_some());
        assert!(store.find_account_by_username("carol").await.unwrap().is_none());
        assert!(store.find_account(AccountId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_messages_listed_oldest_first() {
        let store = MemoryStore::new();
        let account = store.create_account("dave", "hash").await.unwrap();

        let first = store.create_message(account.id, "one").await.unwrap();
        let second = store.create_message(account.id, "two").await.unwrap();

        let listed = store.list_messages(account.id).await.unwrap();
        assert_eq!(listed, vec![first, second]);
    }

    #[tokio::test]
    async fn test_delete_requires_ownership() {
        let store = MemoryStore::new();
        let owner = store.create_account("erin", "hash").await.unwrap();
        let other = store.create_account("frank", "hash").await.unwrap();
        let message = store.create_message(owner.id, "mine").await.unwrap();

        let err = store.delete_message(other.id, message.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let deleted = store.delete_message(owner.id, message.id).await.unwrap();
        assert_eq!(deleted, message);
        assert!(store.list_messages(owner.id).await.unwrap().is_empty());

        let err = store.delete_message(owner.id, message.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_reset_password_consumes_code() {
        let store = MemoryStore::new();
        store.create_account("gina", "old-hash").await.unwrap();
        let now = OffsetDateTime::now_utc();
        let expires_at = now + time::Duration::minutes(15);

        store.set_otp("gina", "123456", expires_at).await.unwrap();

        let err = store.reset_password("gina", "000000", "new-hash", now).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        store.reset_password("gina", "123456", "new-hash", now).await.unwrap();
        let account = store.find_account_by_username("gina").await.unwrap().unwrap();
        assert_eq!(account.password_hash, "new-hash");
        assert!(account.otp.is_none());

        // One use only
        let err = store.reset_password("gina", "123456", "again", now).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let store = MemoryStore::new();
        store.create_account("hank", "hash").await.unwrap();
        let now = OffsetDateTime::now_utc();

        store.set_otp("hank", "111111", now).await.unwrap();
        let err = store.reset_password("hank", "111111", "new", now).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let err = store.set_otp("nobody", "111111", now).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_message_for_unknown_account_rejected() {
        let store = MemoryStore::new();
        let err = store.create_message(AccountId::new(), "orphan").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
