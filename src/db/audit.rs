use sqlx::sqlite::SqlitePool;

use super::StoreError;

/// A persisted audit entry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogRecord {
    pub id: i64,
    pub username: String,
    pub action: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub endpoint: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

#[derive(sqlx::FromRow)]
struct AuditLogRow {
    id: i64,
    username: String,
    action: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    endpoint: Option<String>,
    timestamp: i64,
}

impl From<AuditLogRow> for AuditLogRecord {
    fn from(row: AuditLogRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            action: row.action,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            endpoint: row.endpoint,
            timestamp: row.timestamp.max(0) as u64,
        }
    }
}

const AUDIT_COLUMNS: &str = "id, username, action, ip_address, user_agent, endpoint, timestamp";

#[derive(Clone)]
pub struct AuditLogStore {
    pool: SqlitePool,
}

impl AuditLogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        username: &str,
        action: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        endpoint: Option<&str>,
        timestamp: u64,
    ) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO audit_logs (username, action, ip_address, user_agent, endpoint, timestamp) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(username)
        .bind(action)
        .bind(ip_address)
        .bind(user_agent)
        .bind(endpoint)
        .bind(timestamp as i64)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn list_all(&self) -> Result<Vec<AuditLogRecord>, StoreError> {
        let rows: Vec<AuditLogRow> =
            sqlx::query_as(&format!("SELECT {AUDIT_COLUMNS} FROM audit_logs ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(AuditLogRecord::from).collect())
    }

    pub async fn list_by_username(&self, username: &str) -> Result<Vec<AuditLogRecord>, StoreError> {
        let rows: Vec<AuditLogRow> = sqlx::query_as(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs WHERE username = ? ORDER BY id"
        ))
        .bind(username)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AuditLogRecord::from).collect())
    }

    pub async fn list_by_action(&self, action: &str) -> Result<Vec<AuditLogRecord>, StoreError> {
        let rows: Vec<AuditLogRow> = sqlx::query_as(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_logs WHERE action = ? ORDER BY id"
        ))
        .bind(action)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AuditLogRecord::from).collect())
    }
}
