//! Authentication and account administration.
//!
//! Services return `ServiceError` for every failure branch; the HTTP layer
//! maps each kind to a status code.

mod admin;
mod auth;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::error;

pub use admin::{AdminService, DashboardCounts, UserSummary};
pub use auth::{AuthService, LoginTokens, RegisterRequest, UserProfile};

use crate::db::StoreError;
use crate::password::PasswordError;

/// Typed failures of the authentication core.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Email already exists")]
    DuplicateIdentity,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account locked due to multiple failed attempts. Try again later.")]
    AccountLocked,
    #[error("Token missing")]
    MissingToken,
    #[error("Invalid or missing token")]
    InvalidToken,
    #[error("Token is blacklisted. Please login again.")]
    RevokedToken,
    #[error("You do not have permission to access this resource")]
    InsufficientRole,
    #[error("User not found")]
    NotFound,
    #[error("Too many login attempts. Please try again later.")]
    RateLimited,
    #[error("{0}")]
    Validation(String),
    /// Internal failure. The detail is logged, never shown to clients.
    #[error("An unexpected error occurred")]
    Unexpected(String),
}

impl ServiceError {
    pub fn unexpected(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Unexpected(context.to_string())
    }
}

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn store_err(self, msg: &str) -> Result<T, ServiceError>;
}

impl<T> ResultExt<T> for Result<T, StoreError> {
    fn store_err(self, msg: &str) -> Result<T, ServiceError> {
        self.map_err(|e| ServiceError::unexpected(msg, e))
    }
}

impl<T> ResultExt<T> for Result<T, PasswordError> {
    fn store_err(self, msg: &str) -> Result<T, ServiceError> {
        self.map_err(|e| ServiceError::unexpected(msg, e))
    }
}

/// Per-identity async mutexes. Serialises read-modify-write of one user's
/// lockout counters within this process.
#[derive(Default)]
pub struct IdentityLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, identity: &str) -> IdentityGuard<'_> {
        let mutex = self
            .locks
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        IdentityGuard {
            guard: Some(mutex.lock_owned().await),
            identity: identity.to_string(),
            owner: self,
        }
    }

    /// Number of identities currently holding or waiting on a lock.
    pub fn active(&self) -> usize {
        self.locks.len()
    }
}

/// Releases the identity lock and drops the map entry once nobody else holds it.
pub struct IdentityGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    identity: String,
    owner: &'a IdentityLocks,
}

impl Drop for IdentityGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Map entry + nobody else: strong count is 1 once our guard is gone.
        self.owner
            .locks
            .remove_if(&self.identity, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
