//! Rate limiting for the login endpoint.
//!
//! Fixed-window counter per client address: the first request opens a window,
//! up to `max_requests` are allowed inside it, and the counter resets once
//! more than `window` has passed since the window opened. A burst straddling
//! a window boundary can therefore see close to `2 * max_requests` accepted.

use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::clock::SharedClock;

/// Default login attempts allowed per window.
pub const LOGIN_MAX_REQUESTS: u32 = 10;

/// Default window length: one minute.
pub const LOGIN_WINDOW: Duration = Duration::from_secs(60);

/// Counter state for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    pub request_count: u32,
    /// Milliseconds since the Unix epoch.
    pub window_start: u64,
}

/// Key-value store for windows. Implementations must run `step` for a key
/// as a single critical section so check-then-increment is atomic.
pub trait WindowStore: Send + Sync {
    /// Replace the window for `key` with the one `step` returns (given the
    /// current window, if any) and return `step`'s verdict.
    fn apply(
        &self,
        key: &str,
        step: &dyn Fn(Option<RateLimitWindow>) -> (RateLimitWindow, bool),
    ) -> bool;

    /// Drop windows that opened before `cutoff`. Returns how many were removed.
    fn remove_older_than(&self, cutoff: u64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryWindowStore {
    windows: DashMap<String, RateLimitWindow>,
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WindowStore for InMemoryWindowStore {
    fn apply(
        &self,
        key: &str,
        step: &dyn Fn(Option<RateLimitWindow>) -> (RateLimitWindow, bool),
    ) -> bool {
        // The entry guard holds the shard lock until it is dropped.
        match self.windows.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let (window, allowed) = step(Some(*entry.get()));
                *entry.get_mut() = window;
                allowed
            }
            Entry::Vacant(entry) => {
                let (window, allowed) = step(None);
                entry.insert(window);
                allowed
            }
        }
    }

    fn remove_older_than(&self, cutoff: u64) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| window.window_start >= cutoff);
        before.saturating_sub(self.windows.len())
    }

    fn len(&self) -> usize {
        self.windows.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: LOGIN_MAX_REQUESTS,
            window: LOGIN_WINDOW,
        }
    }
}

/// Fixed-window rate limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    store: Box<dyn WindowStore>,
    clock: SharedClock,
}

impl RateLimiter {
    /// Limiter with an in-memory store.
    pub fn new(config: RateLimitConfig, clock: SharedClock) -> Self {
        Self {
            config,
            store: Box::new(InMemoryWindowStore::new()),
            clock,
        }
    }

    /// Count a request for `key` and report whether it is allowed.
    pub fn allow(&self, key: &str) -> bool {
        let now = self.clock.now_millis();
        let window_ms = self.config.window.as_millis() as u64;
        let max = self.config.max_requests;

        self.store.apply(key, &|current| match current {
            None => (fresh(now), true),
            Some(window) if now.saturating_sub(window.window_start) > window_ms => {
                (fresh(now), true)
            }
            Some(window) if window.request_count < max => (
                RateLimitWindow {
                    request_count: window.request_count + 1,
                    ..window
                },
                true,
            ),
            Some(window) => (window, false),
        })
    }

    /// Forget windows that have already elapsed. Their next request would
    /// reset them anyway.
    pub fn purge_idle(&self) -> usize {
        let now = self.clock.now_millis();
        let window_ms = self.config.window.as_millis() as u64;
        self.store
            .remove_older_than(now.saturating_sub(window_ms))
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

fn fresh(now: u64) -> RateLimitWindow {
    RateLimitWindow {
        request_count: 1,
        window_start: now,
    }
}
