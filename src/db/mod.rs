mod audit;
mod blacklist;
mod user;

use std::sync::Arc;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::clock::{SharedClock, SystemClock};

pub use audit::{AuditLogRecord, AuditLogStore};
pub use blacklist::{SqliteTokenBlacklist, TokenBlacklist};
pub use user::{SqliteUserStore, User, UserRole, UserStore, normalize_email};

/// Storage failure surfaced by the stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique key (email, token) already exists.
    #[error("duplicate key")]
    Duplicate,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Classify a sqlx error, turning unique-constraint violations into `Duplicate`.
    pub(crate) fn from_insert(e: sqlx::Error) -> Self {
        match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => StoreError::Duplicate,
            _ => StoreError::Database(e),
        }
    }
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    clock: SharedClock,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        Self::open_with_clock(path, Arc::new(SystemClock)).await
    }

    /// Same as `open`, stamping blacklist records with the given clock.
    pub async fn open_with_clock(path: &str, clock: SharedClock) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool, clock };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        if version < 2 {
            self.migrate_v2().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id TEXT PRIMARY KEY NOT NULL,
                    name TEXT NOT NULL,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'USER',
                    failed_attempts INTEGER NOT NULL DEFAULT 0,
                    account_locked INTEGER NOT NULL DEFAULT 0,
                    lock_time INTEGER,
                    active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_account_locked ON users(account_locked)",
                // Revoked access tokens, kept until their own expiry
                "CREATE TABLE blacklisted_tokens (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    token TEXT UNIQUE NOT NULL,
                    expiry_time INTEGER NOT NULL,
                    blacklisted_at INTEGER NOT NULL
                )",
                "CREATE INDEX idx_blacklisted_tokens_expiry ON blacklisted_tokens(expiry_time)",
                "CREATE TABLE audit_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL,
                    action TEXT NOT NULL,
                    ip_address TEXT,
                    user_agent TEXT,
                    endpoint TEXT,
                    timestamp INTEGER NOT NULL
                )",
                "CREATE INDEX idx_audit_logs_username ON audit_logs(username)",
                "CREATE INDEX idx_audit_logs_action ON audit_logs(action)",
            ],
        )
        .await
    }

    /// Admin locks are flagged so the lock timer leaves them alone.
    async fn migrate_v2(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            2,
            &["ALTER TABLE users ADD COLUMN admin_locked INTEGER NOT NULL DEFAULT 0"],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> SqliteUserStore {
        SqliteUserStore::new(self.pool.clone())
    }

    /// Get the revoked token store.
    pub fn blacklist(&self) -> SqliteTokenBlacklist {
        SqliteTokenBlacklist::new(self.pool.clone(), self.clock.clone())
    }

    /// Get the audit log store.
    pub fn audit_logs(&self) -> AuditLogStore {
        AuditLogStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
