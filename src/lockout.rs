//! Account lockout state machine.
//!
//! A user is either UNLOCKED with `failed_attempts < max_failed_attempts`, or
//! LOCKED since `lock_time`. Locks from repeated failures run out after
//! `lock_duration`; admin locks last until an admin unlock. The policy only
//! mutates the `User` value; the
//! caller persists it. Per login attempt the caller must run, in order:
//! `check` (auto-unlock or reject), credential verification, then
//! `record_failure` or `record_success`.

use std::time::Duration;

use tracing::info;

use crate::db::User;

/// Default number of consecutive failures before the account locks.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

/// Default lock duration: 15 minutes.
pub const LOCK_DURATION: Duration = Duration::from_secs(15 * 60);

/// Outcome of the pre-credential lock check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockCheck {
    /// Account is unlocked; proceed to the credential check.
    Proceed,
    /// Account was locked but the lock has run out. The user has been reset to
    /// UNLOCKED and must be persisted before proceeding.
    AutoUnlocked,
    /// Account is locked; reject without touching counters.
    Locked,
}

/// Outcome of recording a failed credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Still unlocked, with this many failures so far.
    Counted(u32),
    /// This failure reached the threshold and locked the account.
    LockedNow,
}

#[derive(Debug, Clone, Copy)]
pub struct LockPolicy {
    pub max_failed_attempts: u32,
    pub lock_duration: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: MAX_FAILED_ATTEMPTS,
            lock_duration: LOCK_DURATION,
        }
    }
}

impl LockPolicy {
    pub fn new(max_failed_attempts: u32, lock_duration: Duration) -> Self {
        Self {
            max_failed_attempts: max_failed_attempts.max(1),
            lock_duration,
        }
    }

    /// Auto-unlock an expired lock, or reject a live one.
    pub fn check(&self, user: &mut User, now_ms: u64) -> LockCheck {
        if !user.account_locked {
            return LockCheck::Proceed;
        }

        // Admin locks and locks without a timestamp never expire on their own.
        let Some(lock_time) = user.lock_time.filter(|_| !user.admin_locked) else {
            return LockCheck::Locked;
        };

        if now_ms.saturating_sub(lock_time) >= self.lock_duration.as_millis() as u64 {
            clear(user);
            info!(email = %user.email, "Account auto-unlocked after lock duration");
            LockCheck::AutoUnlocked
        } else {
            LockCheck::Locked
        }
    }

    /// Count a failed password check and lock at the threshold.
    pub fn record_failure(&self, user: &mut User, now_ms: u64) -> FailureOutcome {
        user.failed_attempts = user.failed_attempts.saturating_add(1);

        if user.failed_attempts >= self.max_failed_attempts {
            user.account_locked = true;
            user.lock_time = Some(now_ms);
            FailureOutcome::LockedNow
        } else {
            FailureOutcome::Counted(user.failed_attempts)
        }
    }

    /// Reset after a correct password. Returns whether anything changed.
    pub fn record_success(&self, user: &mut User) -> bool {
        let dirty = user.failed_attempts != 0 || user.account_locked || user.lock_time.is_some();
        clear(user);
        dirty
    }

    /// Administrative lock, bypassing the counter. Stamped with the lock
    /// time, but exempt from auto-unlock.
    pub fn force_lock(&self, user: &mut User, now_ms: u64) {
        user.account_locked = true;
        user.lock_time = Some(now_ms);
        user.admin_locked = true;
    }

    /// Administrative unlock, bypassing the timer.
    pub fn force_unlock(&self, user: &mut User) {
        clear(user);
    }

    /// Time until the lock runs out. `None` when unlocked or when only an
    /// admin can lift the lock.
    pub fn remaining(&self, user: &User, now_ms: u64) -> Option<Duration> {
        if !user.account_locked || user.admin_locked {
            return None;
        }
        let lock_time = user.lock_time?;
        let elapsed = now_ms.saturating_sub(lock_time);
        let total = self.lock_duration.as_millis() as u64;
        Some(Duration::from_millis(total.saturating_sub(elapsed)))
    }
}

fn clear(user: &mut User) {
    user.failed_attempts = 0;
    user.account_locked = false;
    user.lock_time = None;
    user.admin_locked = false;
}
