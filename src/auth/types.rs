//! Authentication context types.

use crate::db::UserRole;

/// Identity established by the auth filter for the current request only.
/// Lives in the request's extensions; never stored across requests.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Normalised email of the token subject.
    pub identity: String,
    pub role: UserRole,
}
