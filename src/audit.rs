//! Audit trail for authentication events.
//!
//! Recording is fire-and-forget: a sink must return immediately and must
//! never fail the operation that produced the event.

use std::fmt;

use tracing::{debug, error};

use crate::clock::SharedClock;
use crate::db::AuditLogStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    RegisterSuccess,
    LoginSuccess,
    LoginFailed,
    Logout,
    AccountLocked,
    AdminLock,
    AdminUnlock,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::RegisterSuccess => "REGISTER_SUCCESS",
            AuditAction::LoginSuccess => "LOGIN_SUCCESS",
            AuditAction::LoginFailed => "LOGIN_FAILED",
            AuditAction::Logout => "LOGOUT",
            AuditAction::AccountLocked => "ACCOUNT_LOCKED",
            AuditAction::AdminLock => "ADMIN_LOCK",
            AuditAction::AdminUnlock => "ADMIN_UNLOCK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "REGISTER_SUCCESS" => AuditAction::RegisterSuccess,
            "LOGIN_SUCCESS" => AuditAction::LoginSuccess,
            "LOGIN_FAILED" => AuditAction::LoginFailed,
            "LOGOUT" => AuditAction::Logout,
            "ACCOUNT_LOCKED" => AuditAction::AccountLocked,
            "ADMIN_LOCK" => AuditAction::AdminLock,
            "ADMIN_UNLOCK" => AuditAction::AdminUnlock,
            _ => return None,
        })
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a request came from, captured at the HTTP boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub endpoint: Option<String>,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, identity: &str, action: AuditAction, meta: &RequestMetadata);
}

/// Writes audit records to the database on a detached task.
#[derive(Clone)]
pub struct DbAuditSink {
    store: AuditLogStore,
    clock: SharedClock,
}

impl DbAuditSink {
    pub fn new(store: AuditLogStore, clock: SharedClock) -> Self {
        Self { store, clock }
    }
}

impl AuditSink for DbAuditSink {
    fn record(&self, identity: &str, action: AuditAction, meta: &RequestMetadata) {
        let store = self.store.clone();
        let identity = identity.to_string();
        let meta = meta.clone();
        let timestamp = self.clock.now_millis();

        debug!(identity = %identity, action = %action, "Audit event");

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            error!(action = %action, "No runtime available, audit event dropped");
            return;
        };

        handle.spawn(async move {
            if let Err(e) = store
                .insert(
                    &identity,
                    action.as_str(),
                    meta.ip_address.as_deref(),
                    meta.user_agent.as_deref(),
                    meta.endpoint.as_deref(),
                    timestamp,
                )
                .await
            {
                error!(action = %action, error = %e, "Failed to write audit log");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::db::Database;

    #[test]
    fn test_action_names_round_trip() {
        for action in [
            AuditAction::RegisterSuccess,
            AuditAction::LoginSuccess,
            AuditAction::LoginFailed,
            AuditAction::Logout,
            AuditAction::AccountLocked,
            AuditAction::AdminLock,
            AuditAction::AdminUnlock,
        ] {
            assert_eq!(AuditAction::parse(action.as_str()), Some(action));
            assert_eq!(
                serde_json::to_value(action).unwrap(),
                serde_json::json!(action.as_str())
            );
        }
        assert_eq!(AuditAction::parse("login_success"), None);
    }

    #[tokio::test]
    async fn test_db_sink_writes_in_background() {
        let db = Database::open(":memory:").await.unwrap();
        let clock = Arc::new(ManualClock::starting_at(5_000));
        let sink = DbAuditSink::new(db.audit_logs(), clock);

        let meta = RequestMetadata {
            ip_address: Some("203.0.113.5".into()),
            user_agent: Some("test-agent".into()),
            endpoint: Some("/api/auth/login".into()),
        };
        sink.record("alice@x.com", AuditAction::LoginFailed, &meta);

        let mut records = Vec::new();
        for _ in 0..50 {
            records = db.audit_logs().list_all().await.unwrap();
            if !records.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].username, "alice@x.com");
        assert_eq!(records[0].action, "LOGIN_FAILED");
        assert_eq!(records[0].ip_address.as_deref(), Some("203.0.113.5"));
        assert_eq!(records[0].timestamp, 5_000);
    }
}
