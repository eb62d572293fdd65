//! Scheduled cleanup of expired blacklist entries and idle rate-limit windows.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::db::TokenBlacklist;
use crate::rate_limit::RateLimiter;

/// Interval between cleanup runs.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// What the sweep operates on.
#[derive(Clone)]
pub struct CleanupTargets {
    pub blacklist: Arc<dyn TokenBlacklist>,
    pub rate_limiter: Arc<RateLimiter>,
}

/// Run all cleanup tasks once.
pub async fn run_cleanup(targets: &CleanupTargets) {
    // Revoked tokens past their expiry would fail verification anyway
    match targets.blacklist.purge_expired().await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired blacklist entries", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up blacklist: {}", e),
    }

    let windows = targets.rate_limiter.purge_idle();
    if windows > 0 {
        debug!("Dropped {} idle rate limit windows", windows);
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(targets: CleanupTargets) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&targets).await;
        }
    })
}
