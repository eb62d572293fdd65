//! Registration, login and logout.

use std::sync::Arc;

use tracing::{info, warn};

use super::{IdentityLocks, ResultExt, ServiceError};
use crate::audit::{AuditAction, AuditSink, RequestMetadata};
use crate::clock::SharedClock;
use crate::db::{StoreError, TokenBlacklist, User, UserRole, UserStore, normalize_email};
use crate::jwt::TokenCodec;
use crate::lockout::{FailureOutcome, LockCheck, LockPolicy};
use crate::password::PasswordHasher;

/// Input to `AuthService::register`.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Defaults to `UserRole::User`.
    pub role: Option<UserRole>,
}

/// Issued on successful login.
#[derive(Debug, Clone)]
pub struct LoginTokens {
    pub access_token: String,
    /// Random opaque identifier; not tracked server-side.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    blacklist: Arc<dyn TokenBlacklist>,
    hasher: Arc<dyn PasswordHasher>,
    codec: Arc<TokenCodec>,
    audit: Arc<dyn AuditSink>,
    policy: LockPolicy,
    clock: SharedClock,
    locks: Arc<IdentityLocks>,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserStore>,
        blacklist: Arc<dyn TokenBlacklist>,
        hasher: Arc<dyn PasswordHasher>,
        codec: Arc<TokenCodec>,
        audit: Arc<dyn AuditSink>,
        policy: LockPolicy,
        clock: SharedClock,
        locks: Arc<IdentityLocks>,
    ) -> Self {
        Self {
            users,
            blacklist,
            hasher,
            codec,
            audit,
            policy,
            clock,
            locks,
        }
    }

    /// Create an account. Emails are unique case-insensitively.
    pub async fn register(
        &self,
        req: RegisterRequest,
        meta: &RequestMetadata,
    ) -> Result<UserProfile, ServiceError> {
        let email = normalize_email(&req.email);

        if self
            .users
            .find_by_email(&email)
            .await
            .store_err("Failed to look up user")?
            .is_some()
        {
            return Err(ServiceError::DuplicateIdentity);
        }

        let password_hash = self
            .hasher
            .hash(&req.password)
            .store_err("Failed to hash password")?;

        let user = User::new(
            req.name.trim(),
            &email,
            password_hash,
            req.role.unwrap_or(UserRole::User),
        );

        match self.users.save(&user).await {
            Ok(()) => {}
            // Lost a race with a concurrent registration for the same email.
            Err(StoreError::Duplicate) => return Err(ServiceError::DuplicateIdentity),
            Err(e) => return Err(ServiceError::unexpected("Failed to save user", e)),
        }

        info!(email = %user.email, role = %user.role.as_str(), "User registered");
        self.audit
            .record(&user.email, AuditAction::RegisterSuccess, meta);

        Ok(UserProfile {
            name: user.name,
            email: user.email,
            role: user.role,
        })
    }

    /// Check credentials under the lockout policy and issue tokens.
    ///
    /// Unknown email, inactive account and wrong password all fail with
    /// `InvalidCredentials`; only a live lock is reported as `AccountLocked`.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        meta: &RequestMetadata,
    ) -> Result<LoginTokens, ServiceError> {
        let email = normalize_email(email);
        let _guard = self.locks.acquire(&email).await;

        let user = self
            .users
            .find_by_email(&email)
            .await
            .store_err("Failed to look up user")?;

        let Some(mut user) = user.filter(|u| u.active) else {
            warn!(email = %email, "Login for unknown or inactive account");
            self.audit.record(&email, AuditAction::LoginFailed, meta);
            return Err(ServiceError::InvalidCredentials);
        };

        let now = self.clock.now_millis();

        match self.policy.check(&mut user, now) {
            LockCheck::Proceed => {}
            LockCheck::AutoUnlocked => {
                self.users
                    .save(&user)
                    .await
                    .store_err("Failed to save user")?;
            }
            LockCheck::Locked => {
                match self.policy.remaining(&user, now) {
                    Some(retry_after) => warn!(
                        email = %email,
                        retry_after_secs = retry_after.as_secs(),
                        "Login rejected, account locked"
                    ),
                    None => warn!(email = %email, "Login rejected, account locked by admin"),
                }
                self.audit.record(&email, AuditAction::AccountLocked, meta);
                return Err(ServiceError::AccountLocked);
            }
        }

        let valid = self
            .hasher
            .matches(password, &user.password_hash)
            .store_err("Failed to verify password")?;

        if !valid {
            let outcome = self.policy.record_failure(&mut user, now);
            self.users
                .save(&user)
                .await
                .store_err("Failed to save user")?;
            self.audit.record(&email, AuditAction::LoginFailed, meta);

            return match outcome {
                FailureOutcome::Counted(attempts) => {
                    warn!(email = %email, attempts, "Login failed");
                    Err(ServiceError::InvalidCredentials)
                }
                FailureOutcome::LockedNow => {
                    warn!(email = %email, "Account locked after repeated failures");
                    self.audit.record(&email, AuditAction::AccountLocked, meta);
                    Err(ServiceError::AccountLocked)
                }
            };
        }

        if self.policy.record_success(&mut user) {
            self.users
                .save(&user)
                .await
                .store_err("Failed to save user")?;
        }

        let issued = self
            .codec
            .issue(&user.email, user.role)
            .map_err(|e| ServiceError::unexpected("Failed to issue token", e))?;

        info!(email = %email, "Login succeeded");
        self.audit.record(&email, AuditAction::LoginSuccess, meta);

        Ok(LoginTokens {
            access_token: issued.token,
            refresh_token: uuid::Uuid::new_v4().to_string(),
            expires_in: issued.duration,
        })
    }

    /// Revoke the presented token until its natural expiry.
    pub async fn logout(
        &self,
        token: Option<&str>,
        meta: &RequestMetadata,
    ) -> Result<(), ServiceError> {
        let token = token.ok_or(ServiceError::MissingToken)?;

        let verified = self
            .codec
            .verify(token)
            .map_err(|_| ServiceError::InvalidToken)?;

        self.blacklist
            .revoke(token, verified.expires_at.saturating_mul(1000))
            .await
            .store_err("Failed to revoke token")?;

        info!(email = %verified.identity, "Logged out");
        self.audit
            .record(&verified.identity, AuditAction::Logout, meta);
        Ok(())
    }

    /// Profile of an authenticated identity.
    pub async fn profile(&self, identity: &str) -> Result<UserProfile, ServiceError> {
        let user = self
            .users
            .find_by_email(identity)
            .await
            .store_err("Failed to look up user")?
            .ok_or(ServiceError::NotFound)?;

        Ok(UserProfile {
            name: user.name,
            email: user.email,
            role: user.role,
        })
    }
}
