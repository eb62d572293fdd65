mod admin;
mod auth;
mod error;
mod extractors;
mod meta;
mod middleware;
mod user;
mod validate;

use std::sync::Arc;

use axum::Router;
use serde::Serialize;

use crate::auth::{AuthFilter, IpExtractor};
use crate::rate_limit::RateLimiter;
use crate::service::{AdminService, AuthService};

pub use error::{ApiError, ErrorBody, error_path};
pub use extractors::{AdminOnly, AnyRole, Auth, RoleConstraint};
pub use meta::{ClientMeta, HasIpExtractor};
pub use middleware::{LoginRateLimit, auth_filter, rate_limit_login};

/// Plain confirmation body.
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

/// Everything the API handlers need.
#[derive(Clone)]
pub struct ApiContext {
    pub auth: Arc<AuthService>,
    pub admin: Arc<AdminService>,
    pub filter: Arc<AuthFilter>,
    pub rate_limiter: Arc<RateLimiter>,
    pub ip_extractor: Option<IpExtractor>,
}

/// Create the API router.
///
/// Register and login are public. Everything else runs behind the auth
/// filter, which attaches the caller's identity for the role extractors.
pub fn create_api_router(ctx: ApiContext) -> Router {
    let auth_state = auth::AuthState {
        service: ctx.auth.clone(),
        rate_limit: LoginRateLimit {
            limiter: ctx.rate_limiter,
            ip_extractor: ctx.ip_extractor.clone(),
        },
        ip_extractor: ctx.ip_extractor.clone(),
    };

    let user_state = user::UserState { service: ctx.auth };

    let admin_state = admin::AdminState {
        service: ctx.admin,
        ip_extractor: ctx.ip_extractor,
    };

    let protected = Router::new()
        .merge(auth::protected_router(auth_state.clone()))
        .nest("/user", user::router(user_state))
        .nest("/admin", admin::router(admin_state))
        .route_layer(axum::middleware::from_fn_with_state(ctx.filter, auth_filter));

    Router::new()
        .merge(auth::public_router(auth_state))
        .merge(protected)
        .layer(axum::middleware::from_fn(error_path))
}
