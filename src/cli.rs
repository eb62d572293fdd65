//! CLI argument parsing, validation, and startup helpers.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use crate::auth::IpExtractor;
use crate::clock::SystemClock;
use crate::db::Database;
use crate::jwt::ACCESS_TOKEN_DURATION_SECS;
use crate::lockout::{LOCK_DURATION, LockPolicy, MAX_FAILED_ATTEMPTS};
use crate::rate_limit::{LOGIN_MAX_REQUESTS, LOGIN_WINDOW, RateLimitConfig};
use crate::{SecurityPolicy, ServerConfig};

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rolegate",
    about = "Token authentication service with account lockout and role-based access"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "ROLEGATE_PORT", default_value = "8080")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "ROLEGATE_DATABASE", default_value = "rolegate.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "ROLEGATE_TOKEN_TTL_SECS", default_value_t = ACCESS_TOKEN_DURATION_SECS)]
    pub token_ttl_secs: u64,

    /// Consecutive failed logins before an account is locked
    #[arg(long, env = "ROLEGATE_MAX_FAILED_ATTEMPTS", default_value_t = MAX_FAILED_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..))]
    pub max_failed_attempts: u32,

    /// How long a lock lasts, in seconds
    #[arg(long, env = "ROLEGATE_LOCK_DURATION_SECS", default_value_t = LOCK_DURATION.as_secs())]
    pub lock_duration_secs: u64,

    /// Login requests allowed per client address per window
    #[arg(long, env = "ROLEGATE_LOGIN_MAX_REQUESTS", default_value_t = LOGIN_MAX_REQUESTS,
        value_parser = clap::value_parser!(u32).range(1..))]
    pub login_max_requests: u32,

    /// Login rate limit window in milliseconds
    #[arg(long, env = "ROLEGATE_LOGIN_WINDOW_MS", default_value_t = LOGIN_WINDOW.as_millis() as u64)]
    pub login_window_ms: u64,

    /// Read the client address from this header (e.g. x-forwarded-for, x-real-ip).
    /// Only use behind a reverse proxy that sets it
    #[arg(long, env = "ROLEGATE_IP_HEADER")]
    pub ip_header: Option<IpExtractor>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

impl Args {
    pub fn security_policy(&self) -> SecurityPolicy {
        SecurityPolicy {
            token_ttl_secs: self.token_ttl_secs,
            lock: LockPolicy::new(
                self.max_failed_attempts,
                Duration::from_secs(self.lock_duration_secs),
            ),
            rate_limit: RateLimitConfig {
                max_requests: self.login_max_requests,
                window: Duration::from_millis(self.login_window_ms),
            },
        }
    }
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        policy: args.security_policy(),
        ip_extractor: args.ip_header.clone(),
        clock: Arc::new(SystemClock),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
