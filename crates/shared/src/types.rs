//! Common types used across clipsync

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Account ID wrapper
///
/// Stable for the lifetime of the account and embedded in every issued token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for AccountId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Message ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MessageId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Database Models
// =============================================================================

/// Registered account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date_joined: OffsetDateTime,
    /// Pending password recovery code
    #[serde(skip)]
    pub otp: Option<String>,
    #[serde(skip)]
    pub otp_expires_at: Option<OffsetDateTime>,
}

impl Account {
    /// True if `code` is the pending recovery code and it has not expired
    pub fn otp_matches(&self, code: &str, now: OffsetDateTime) -> bool {
        match (&self.otp, self.otp_expires_at) {
            (Some(otp), Some(expires_at)) => now < expires_at && otp == code.trim(),
            _ => false,
        }
    }
}

/// A stored message owned by one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: MessageId,
    pub account_id: AccountId,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Message {
    /// Build a new message stamped with the current time
    pub fn new(account_id: AccountId, text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            account_id,
            text: text.into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }
}
