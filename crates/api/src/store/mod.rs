//! Persistence for accounts and messages
//!
//! Two backends implement [`Store`]: Postgres for deployments and an
//! in-memory map for local development and tests.

use async_trait::async_trait;
use clipsync_shared::{Account, AccountId, Message, MessageId};
use thiserror::Error;
use time::OffsetDateTime;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
            ref e if is_unique_violation(e) => StoreError::Conflict(e.to_string()),
            e => StoreError::Database(e.to_string()),
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|code| code == "23505").unwrap_or(false);
    }
    false
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Create an account. Usernames are unique.
    async fn create_account(&self, username: &str, password_hash: &str) -> StoreResult<Account>;
    async fn find_account_by_username(&self, username: &str) -> StoreResult<Option<Account>>;
    async fn find_account(&self, id: AccountId) -> StoreResult<Option<Account>>;

    /// Store a recovery code for `username`, replacing any pending one.
    async fn set_otp(&self, username: &str, otp: &str, expires_at: OffsetDateTime) -> StoreResult<()>;
    /// Replace the password if `otp` is the pending, unexpired code, and clear
    /// the code. `NotFound` when the account or a matching code is missing.
    async fn reset_password(
        &self,
        username: &str,
        otp: &str,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> StoreResult<()>;

    async fn create_message(&self, account_id: AccountId, text: &str) -> StoreResult<Message>;
    /// Delete a message owned by `account_id`. Messages of other accounts are reported as missing.
    async fn delete_message(&self, account_id: AccountId, id: MessageId) -> StoreResult<Message>;
    /// Messages of one account, oldest first.
    async fn list_messages(&self, account_id: AccountId) -> StoreResult<Vec<Message>>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
