//! Axum extractors for role-based authorization.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::error::ApiError;
use crate::auth::AuthContext;
use crate::db::UserRole;
use crate::service::ServiceError;

/// Which roles an endpoint accepts.
pub trait RoleConstraint: Send + Sync + 'static {
    fn allows(role: UserRole) -> bool;
}

/// Any authenticated user.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn allows(_role: UserRole) -> bool {
        true
    }
}

/// Administrators only.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn allows(role: UserRole) -> bool {
        role == UserRole::Admin
    }
}

/// Extractor for endpoints that require an authenticated caller with a role
/// accepted by `R`. Reads the context attached by the auth filter.
///
/// No context gives 401; a context whose role `R` rejects gives 403.
pub struct Auth<R: RoleConstraint = AnyRole> {
    pub context: AuthContext,
    _role: PhantomData<R>,
}

impl<R: RoleConstraint> Auth<R> {
    pub fn identity(&self) -> &str {
        &self.context.identity
    }
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(ApiError::from(ServiceError::InvalidToken))?;

        if !R::allows(context.role) {
            warn!(email = %context.identity, path = %parts.uri.path(), "Insufficient role");
            return Err(ServiceError::InsufficientRole.into());
        }

        Ok(Auth {
            context,
            _role: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    fn parts_with(ctx: Option<AuthContext>) -> Parts {
        let (mut parts, _) = Request::builder()
            .uri("/api/admin/users")
            .body(())
            .unwrap()
            .into_parts();
        if let Some(ctx) = ctx {
            parts.extensions.insert(ctx);
        }
        parts
    }

    fn ctx(role: UserRole) -> AuthContext {
        AuthContext {
            identity: "alice@x.com".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_missing_context_is_unauthorized() {
        let mut parts = parts_with(None);
        let Err(rejection) = Auth::<AnyRole>::from_request_parts(&mut parts, &()).await else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_user_role_is_forbidden_for_admin() {
        let mut parts = parts_with(Some(ctx(UserRole::User)));
        let Err(rejection) = Auth::<AdminOnly>::from_request_parts(&mut parts, &()).await else {
            panic!("expected rejection");
        };
        assert_eq!(rejection.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_passes_both() {
        let mut parts = parts_with(Some(ctx(UserRole::Admin)));
        assert!(Auth::<AdminOnly>::from_request_parts(&mut parts, &()).await.is_ok());
        let auth = Auth::<AnyRole>::from_request_parts(&mut parts, &())
            .await
            .ok()
            .unwrap();
        assert_eq!(auth.identity(), "alice@x.com");
    }
}
