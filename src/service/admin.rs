//! Account administration: dashboard counts, user listing, manual lock and
//! unlock, audit log queries.

use std::sync::Arc;

use tracing::info;

use super::{IdentityLocks, ResultExt, ServiceError};
use crate::audit::{AuditAction, AuditSink, RequestMetadata};
use crate::clock::SharedClock;
use crate::db::{
    AuditLogRecord, AuditLogStore, User, UserRole, UserStore, normalize_email,
};
use crate::lockout::LockPolicy;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCounts {
    pub total_users: u64,
    /// Users not currently locked.
    pub active_users: u64,
    pub locked_users: u64,
}

/// A user as shown to administrators. Never carries the password hash.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub account_locked: bool,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            account_locked: user.account_locked,
        }
    }
}

pub struct AdminService {
    users: Arc<dyn UserStore>,
    audit_logs: AuditLogStore,
    audit: Arc<dyn AuditSink>,
    policy: LockPolicy,
    clock: SharedClock,
    locks: Arc<IdentityLocks>,
}

impl AdminService {
    pub fn new(
        users: Arc<dyn UserStore>,
        audit_logs: AuditLogStore,
        audit: Arc<dyn AuditSink>,
        policy: LockPolicy,
        clock: SharedClock,
        locks: Arc<IdentityLocks>,
    ) -> Self {
        Self {
            users,
            audit_logs,
            audit,
            policy,
            clock,
            locks,
        }
    }

    pub async fn dashboard(&self) -> Result<DashboardCounts, ServiceError> {
        let total_users = self.users.count().await.store_err("Failed to count users")?;
        let locked_users = self
            .users
            .count_locked()
            .await
            .store_err("Failed to count locked users")?;

        Ok(DashboardCounts {
            total_users,
            active_users: total_users.saturating_sub(locked_users),
            locked_users,
        })
    }

    pub async fn list_users(&self) -> Result<Vec<UserSummary>, ServiceError> {
        let users = self.users.list().await.store_err("Failed to list users")?;
        Ok(users.into_iter().map(UserSummary::from).collect())
    }

    /// Lock an account by id. The lock is timestamped, so it still expires
    /// after the configured lock duration.
    pub async fn lock_user(
        &self,
        id: &str,
        admin_identity: &str,
        meta: &RequestMetadata,
    ) -> Result<UserSummary, ServiceError> {
        let user = self
            .update_user(id, |policy, user, now| policy.force_lock(user, now))
            .await?;

        info!(admin = %admin_identity, email = %user.email, "Account locked by admin");
        self.audit
            .record(admin_identity, AuditAction::AdminLock, meta);
        Ok(user.into())
    }

    /// Unlock an account by id and clear its failure counter.
    pub async fn unlock_user(
        &self,
        id: &str,
        admin_identity: &str,
        meta: &RequestMetadata,
    ) -> Result<UserSummary, ServiceError> {
        let user = self
            .update_user(id, |policy, user, _| policy.force_unlock(user))
            .await?;

        info!(admin = %admin_identity, email = %user.email, "Account unlocked by admin");
        self.audit
            .record(admin_identity, AuditAction::AdminUnlock, meta);
        Ok(user.into())
    }

    /// Read-modify-write of one user under that user's identity lock, so it
    /// cannot interleave with a concurrent login for the same account.
    async fn update_user(
        &self,
        id: &str,
        change: impl FnOnce(&LockPolicy, &mut User, u64),
    ) -> Result<User, ServiceError> {
        let email = self
            .users
            .find_by_id(id)
            .await
            .store_err("Failed to look up user")?
            .ok_or(ServiceError::NotFound)?
            .email;

        let _guard = self.locks.acquire(&email).await;

        // Re-read under the lock; the first read only told us which lock to take.
        let mut user = self
            .users
            .find_by_id(id)
            .await
            .store_err("Failed to look up user")?
            .ok_or(ServiceError::NotFound)?;

        change(&self.policy, &mut user, self.clock.now_millis());
        self.users
            .save(&user)
            .await
            .store_err("Failed to save user")?;
        Ok(user)
    }

    /// Audit entries in insertion order. `username` takes precedence over `action`.
    pub async fn audit_logs(
        &self,
        username: Option<&str>,
        action: Option<AuditAction>,
    ) -> Result<Vec<AuditLogRecord>, ServiceError> {
        let records = match (username, action) {
            (Some(username), _) => {
                self.audit_logs
                    .list_by_username(&normalize_email(username))
                    .await
            }
            (None, Some(action)) => self.audit_logs.list_by_action(action.as_str()).await,
            (None, None) => self.audit_logs.list_all().await,
        };
        records.store_err("Failed to read audit logs")
    }
}
