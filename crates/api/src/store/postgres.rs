//! Postgres-backed store.
//!
//! Schema lives in `migrations/` at the workspace root and is applied at startup
//! by `clipsync_shared::run_migrations`.

use super::{Store, StoreError, StoreResult};
use async_trait::async_trait;
use clipsync_shared::{Account, AccountId, Message, MessageId};
use sqlx::PgPool;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_account(&self, username: &str, password_hash: &str) -> StoreResult<Account> {
        let result = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, username, password_hash, date_joined)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, username, password_hash, date_joined, otp, otp_expires_at
            "#,
        )
        .bind(AccountId::new())
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(account) => Ok(account),
            Err(err) => match StoreError::from(err) {
                StoreError::Conflict(_) => {
                    Err(StoreError::Conflict(format!("username {username} is taken")))
                }
                other => Err(other),
            },
        }
    }

    async fn find_account_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, username, password_hash, date_joined, otp, otp_expires_at FROM accounts WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn find_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, username, password_hash, date_joined, otp, otp_expires_at FROM accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn set_otp(&self, username: &str, otp: &str, expires_at: OffsetDateTime) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE accounts SET otp = $2, otp_expires_at = $3 WHERE username = $1",
        )
        .bind(username)
        .bind(otp)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("account {username}")));
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
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $3, otp = NULL, otp_expires_at = NULL
            WHERE username = $1 AND otp = $2 AND otp_expires_at > $4
            "#,
        )
        .bind(username)
        .bind(otp.trim())
        .bind(password_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("recovery code".to_string()));
        }
        Ok(())
    }

    async fn create_message(&self, account_id: AccountId, text: &str) -> StoreResult<Message> {
        let message = Message::new(account_id, text);
        let result = sqlx::query(
            r#"
            INSERT INTO messages (id, account_id, text, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(message.id)
        .bind(message.account_id)
        .bind(&message.text)
        .bind(message.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(message),
            // foreign_key_violation
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23503") => {
                Err(StoreError::NotFound(format!("account {account_id}")))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_message(&self, account_id: AccountId, id: MessageId) -> StoreResult<Message> {
        sqlx::query_as::<_, Message>(
            r#"
            DELETE FROM messages
            WHERE id = $1 AND account_id = $2
            RETURNING id, account_id, text, created_at
            "#,
        )
        .bind(id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("message {id}")))
    }

    async fn list_messages(&self, account_id: AccountId) -> StoreResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, account_id, text, created_at
            FROM messages
            WHERE account_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
