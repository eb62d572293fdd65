//! Request gates in front of the handlers: the bearer-token filter and the
//! per-address login rate limit.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::error::ApiError;
use crate::auth::{AuthFilter, FilterOutcome, IpExtractor, bearer_token, extract_client_ip};
use crate::rate_limit::RateLimiter;
use crate::service::ServiceError;

/// Attach an `AuthContext` to requests with a usable bearer token.
/// A revoked token is rejected here; any other failure stays anonymous.
pub async fn auth_filter(
    State(filter): State<Arc<AuthFilter>>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = filter.authenticate(bearer_token(request.headers())).await;

    match outcome {
        FilterOutcome::Authenticated(ctx) => {
            request.extensions_mut().insert(ctx);
        }
        FilterOutcome::Revoked => {
            warn!(path = %request.uri().path(), "Revoked token presented");
            return ApiError::from(ServiceError::RevokedToken).into_response();
        }
        FilterOutcome::Anonymous => {}
    }

    next.run(request).await
}

/// State for the login rate limit middleware.
#[derive(Clone)]
pub struct LoginRateLimit {
    pub limiter: Arc<RateLimiter>,
    pub ip_extractor: Option<IpExtractor>,
}

/// Rate limit login attempts per client address.
pub async fn rate_limit_login(
    State(state): State<LoginRateLimit>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match extract_client_ip(&request, state.ip_extractor.as_ref()) {
        Ok(ip) => ip,
        Err(reason) => {
            warn!(reason, "Unable to determine client IP for rate limiting");
            return ApiError::forbidden("Unable to determine client IP.").into_response();
        }
    };

    if state.limiter.allow(&ip) {
        next.run(request).await
    } else {
        warn!(ip = %ip, "Login rate limit exceeded");
        ApiError::from(ServiceError::RateLimited).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use crate::db::UserStore;

    use axum::{
        Router,
        body::Body,
        http::{self, StatusCode},
        middleware,
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::clock::ManualClock;
    use crate::db::{Database, TokenBlacklist, User, UserRole};
    use crate::jwt::TokenCodec;
    use crate::rate_limit::RateLimitConfig;

    fn request(header: Option<(&str, &str)>) -> http::Request<Body> {
        let mut builder = http::Request::builder().uri("/");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn status(router: &Router, header: Option<(&str, &str)>) -> StatusCode {
        router.clone().oneshot(request(header)).await.unwrap().status()
    }

    fn limited_router() -> Router {
        let state = LoginRateLimit {
            limiter: Arc::new(RateLimiter::new(
                RateLimitConfig {
                    max_requests: 2,
                    window: Duration::from_secs(60),
                },
                Arc::new(ManualClock::new()),
            )),
            ip_extractor: Some("x-forwarded-for".parse().unwrap()),
        };
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(state, rate_limit_login))
    }

    #[tokio::test]
    async fn test_login_limit_is_per_address() {
        let router = limited_router();
        let a = Some(("x-forwarded-for", "203.0.113.5"));
        let b = Some(("x-forwarded-for", "203.0.113.6"));

        assert_eq!(status(&router, a).await, StatusCode::OK);
        assert_eq!(status(&router, a).await, StatusCode::OK);
        assert_eq!(status(&router, a).await, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status(&router, b).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_without_address_is_refused() {
        let router = limited_router();
        assert_eq!(status(&router, None).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_auth_filter_attaches_context_and_rejects_revoked() {
        let clock = Arc::new(ManualClock::new());
        let db = Database::open_with_clock(":memory:", clock.clone())
            .await
            .unwrap();
        let user = User::new("Alice", "alice@x.com", "hash".to_string(), UserRole::User);
        db.users().save(&user).await.unwrap();

        let codec = Arc::new(TokenCodec::new(b"middleware-secret", 900, clock));
        let filter = Arc::new(AuthFilter::new(
            Arc::new(db.blacklist()),
            codec.clone(),
            Arc::new(db.users()),
        ));
        let router = Router::new()
            .route(
                "/",
                get(|request: Request| async move {
                    match request.extensions().get::<crate::auth::AuthContext>() {
                        Some(ctx) => ctx.identity.clone(),
                        None => "anonymous".to_string(),
                    }
                }),
            )
            .layer(middleware::from_fn_with_state(filter, auth_filter));

        let issued = codec.issue("alice@x.com", UserRole::User).unwrap();
        let bearer = format!("Bearer {}", issued.token);

        let response = router
            .clone()
            .oneshot(request(Some(("authorization", &bearer))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"alice@x.com");

        assert_eq!(status(&router, None).await, StatusCode::OK);

        db.blacklist()
            .revoke(&issued.token, issued.expires_at * 1000)
            .await
            .unwrap();
        assert_eq!(
            status(&router, Some(("authorization", &bearer))).await,
            StatusCode::UNAUTHORIZED
        );
    }
}
