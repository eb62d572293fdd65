use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;

use super::StoreError;

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Admin => "ADMIN",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "ADMIN" => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

/// A registered account together with its lockout bookkeeping.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    /// Normalised (trimmed, lowercase) email.
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub failed_attempts: u32,
    pub account_locked: bool,
    /// Milliseconds since the Unix epoch at which the current lock began.
    pub lock_time: Option<u64>,
    /// Set by an administrator; such a lock only ends with an admin unlock.
    pub admin_locked: bool,
    pub active: bool,
}

impl User {
    /// Build a fresh, unlocked, active user with a random id.
    pub fn new(name: &str, email: &str, password_hash: String, role: UserRole) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: normalize_email(email),
            password_hash,
            role,
            failed_attempts: 0,
            account_locked: false,
            lock_time: None,
            admin_locked: false,
            active: true,
        }
    }
}

/// Emails are compared case-insensitively and without surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Persistence boundary for users.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;
    /// Insert or update by id. Fails with `StoreError::Duplicate` if another
    /// user already owns the email.
    async fn save(&self, user: &User) -> Result<(), StoreError>;
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    async fn count(&self) -> Result<u64, StoreError>;
    async fn count_locked(&self) -> Result<u64, StoreError>;
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    failed_attempts: i64,
    account_locked: i32,
    lock_time: Option<i64>,
    admin_locked: i32,
    active: i32,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: UserRole::from_str(&row.role),
            failed_attempts: row.failed_attempts.max(0) as u32,
            account_locked: row.account_locked != 0,
            lock_time: row.lock_time.map(|t| t.max(0) as u64),
            admin_locked: row.admin_locked != 0,
            active: row.active != 0,
        }
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, failed_attempts, \
     account_locked, lock_time, admin_locked, active";

#[derive(Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
                .bind(normalize_email(email))
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::from))
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, failed_attempts, account_locked, lock_time, admin_locked, active)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                password_hash = excluded.password_hash,
                role = excluded.role,
                failed_attempts = excluded.failed_attempts,
                account_locked = excluded.account_locked,
                lock_time = excluded.lock_time,
                admin_locked = excluded.admin_locked,
                active = excluded.active",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(normalize_email(&user.email))
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.failed_attempts as i64)
        .bind(user.account_locked as i32)
        .bind(user.lock_time.map(|t| t as i64))
        .bind(user.admin_locked as i32)
        .bind(user.active as i32)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_insert)?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, email"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0.max(0) as u64)
    }

    async fn count_locked(&self) -> Result<u64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE account_locked = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0.max(0) as u64)
    }
}
