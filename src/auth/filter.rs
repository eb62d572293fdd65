//! Per-request authentication gate.
//!
//! Order of checks: blacklist, then signature and expiry, then that the
//! subject still exists and is active. Only a blacklist hit rejects the
//! request outright; every other failure leaves the request anonymous and
//! lets the role extractors decide the response.

use std::sync::Arc;

use tracing::{debug, error};

use super::types::AuthContext;
use crate::db::{TokenBlacklist, UserStore};
use crate::jwt::TokenCodec;

#[derive(Debug)]
pub enum FilterOutcome {
    /// No token, or a token that failed verification.
    Anonymous,
    Authenticated(AuthContext),
    /// The token was revoked by logout.
    Revoked,
}

pub struct AuthFilter {
    blacklist: Arc<dyn TokenBlacklist>,
    codec: Arc<TokenCodec>,
    users: Arc<dyn UserStore>,
}

impl AuthFilter {
    pub fn new(
        blacklist: Arc<dyn TokenBlacklist>,
        codec: Arc<TokenCodec>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            blacklist,
            codec,
            users,
        }
    }

    pub async fn authenticate(&self, token: Option<&str>) -> FilterOutcome {
        let Some(token) = token else {
            return FilterOutcome::Anonymous;
        };

        match self.blacklist.is_revoked(token).await {
            Ok(true) => return FilterOutcome::Revoked,
            Ok(false) => {}
            Err(e) => {
                error!(error = %e, "Failed to check token blacklist");
                return FilterOutcome::Anonymous;
            }
        }

        let verified = match self.codec.verify(token) {
            Ok(verified) => verified,
            Err(e) => {
                debug!(error = %e, "Bearer token rejected");
                return FilterOutcome::Anonymous;
            }
        };

        match self.users.find_by_email(&verified.identity).await {
            Ok(Some(user)) if user.active => FilterOutcome::Authenticated(AuthContext {
                identity: verified.identity,
                role: verified.role,
            }),
            Ok(_) => {
                debug!(email = %verified.identity, "Token subject missing or inactive");
                FilterOutcome::Anonymous
            }
            Err(e) => {
                error!(error = %e, "Failed to look up token subject");
                FilterOutcome::Anonymous
            }
        }
    }
}
