pub mod api;
pub mod audit;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod clock;
pub mod db;
pub mod jwt;
pub mod lockout;
pub mod password;
pub mod rate_limit;
pub mod service;

use std::net::SocketAddr;
use std::sync::Arc;

use api::{ApiContext, create_api_router};
use audit::DbAuditSink;
use auth::{AuthFilter, IpExtractor};
use axum::Router;
use cleanup::CleanupTargets;
use clock::SharedClock;
use db::Database;
use jwt::{ACCESS_TOKEN_DURATION_SECS, TokenCodec};
use lockout::LockPolicy;
use password::Argon2Hasher;
use rate_limit::{RateLimitConfig, RateLimiter};
use service::{AdminService, AuthService, IdentityLocks};
use tokio::net::TcpListener;

/// Tunable security parameters.
#[derive(Debug, Clone, Copy)]
pub struct SecurityPolicy {
    /// Access token lifetime in seconds
    pub token_ttl_secs: u64,
    pub lock: LockPolicy,
    pub rate_limit: RateLimitConfig,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            token_ttl_secs: ACCESS_TOKEN_DURATION_SECS,
            lock: LockPolicy::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    pub policy: SecurityPolicy,
    /// IP extraction strategy (requires running behind a proxy)
    pub ip_extractor: Option<IpExtractor>,
    /// Time source for token expiry, lockout and rate limiting
    pub clock: SharedClock,
}

/// The router plus the shared state the cleanup sweep works on.
pub struct App {
    pub router: Router,
    pub cleanup: CleanupTargets,
}

/// Wire services, middleware and routes for the given configuration.
pub fn build_app(config: &ServerConfig) -> App {
    let clock = config.clock.clone();
    let db = &config.db;

    let users = Arc::new(db.users());
    let blacklist = Arc::new(db.blacklist());
    let codec = Arc::new(TokenCodec::new(
        &config.jwt_secret,
        config.policy.token_ttl_secs,
        clock.clone(),
    ));
    let audit = Arc::new(DbAuditSink::new(db.audit_logs(), clock.clone()));
    let locks = Arc::new(IdentityLocks::new());
    let rate_limiter = Arc::new(RateLimiter::new(config.policy.rate_limit, clock.clone()));

    let auth = Arc::new(AuthService::new(
        users.clone(),
        blacklist.clone(),
        Arc::new(Argon2Hasher::new()),
        codec.clone(),
        audit.clone(),
        config.policy.lock,
        clock.clone(),
        locks.clone(),
    ));

    let admin = Arc::new(AdminService::new(
        users.clone(),
        db.audit_logs(),
        audit,
        config.policy.lock,
        clock,
        locks,
    ));

    let api_router = create_api_router(ApiContext {
        auth,
        admin,
        filter: Arc::new(AuthFilter::new(blacklist.clone(), codec, users)),
        rate_limiter: rate_limiter.clone(),
        ip_extractor: config.ip_extractor.clone(),
    });

    let router = Router::new().nest("/api", api_router);

    App {
        router,
        cleanup: CleanupTargets {
            blacklist,
            rate_limiter,
        },
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    build_app(config).router
}

/// Run cleanup tasks and spawn background scheduler.
pub async fn init_cleanup(targets: &CleanupTargets) {
    cleanup::run_cleanup(targets).await;
    cleanup::spawn_cleanup_scheduler(targets.clone());
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = build_app(&config);
    init_cleanup(&app.cleanup).await;
    let make_service = app
        .router
        .into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    Ok((handle, local_addr))
}
