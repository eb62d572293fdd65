//! Revoked access token storage.
//!
//! Access tokens are stateless, so logout records the token string here until
//! the token's own expiry. Once that passes, the record is dead weight: the
//! codec rejects the token anyway, and `purge_expired` may drop it.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;

use super::StoreError;
use crate::clock::SharedClock;

/// Append + existence-check store for revoked tokens.
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Record a revoked token. Revoking the same token twice is a no-op;
    /// returns whether a new record was written.
    async fn revoke(&self, token: &str, expiry_time: u64) -> Result<bool, StoreError>;
    async fn is_revoked(&self, token: &str) -> Result<bool, StoreError>;
    /// Drop records whose expiry has passed. Returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub struct SqliteTokenBlacklist {
    pool: SqlitePool,
    clock: SharedClock,
}

impl SqliteTokenBlacklist {
    pub fn new(pool: SqlitePool, clock: SharedClock) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl TokenBlacklist for SqliteTokenBlacklist {
    async fn revoke(&self, token: &str, expiry_time: u64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO blacklisted_tokens (token, expiry_time, blacklisted_at) VALUES (?, ?, ?)",
        )
        .bind(token)
        .bind(expiry_time.min(i64::MAX as u64) as i64)
        .bind(self.clock.now_millis() as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, StoreError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM blacklisted_tokens WHERE token = ? LIMIT 1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM blacklisted_tokens WHERE expiry_time < ?")
            .bind(self.clock.now_millis() as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
