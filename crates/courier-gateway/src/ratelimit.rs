//! Per-identity fixed-window rate limiting.
//!
//! Two operation classes with independent budgets per account: sends
//! (message creation) and reads (everything else). Counters reset when
//! their window expires; there is no smoothing across windows.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use courier_core::AccountId;

/// Default send budget per window.
pub const DEFAULT_SEND_LIMIT: u32 = 30;

/// Default read budget per window.
pub const DEFAULT_READ_LIMIT: u32 = 120;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Operation class being limited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpClass {
    /// Message sends.
    Send,
    /// Read-side operations.
    Read,
}

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window limiter keyed by account and operation class.
pub struct RateLimiter {
    send_limit: u32,
    read_limit: u32,
    window: Duration,
    windows: Mutex<HashMap<(u64, OpClass), Window>>,
}

impl RateLimiter {
    /// Create a limiter with the default budgets.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_SEND_LIMIT, DEFAULT_READ_LIMIT, DEFAULT_WINDOW)
    }

    /// Create a limiter with explicit budgets.
    pub fn with_limits(send_limit: u32, read_limit: u32, window: Duration) -> Self {
        Self {
            send_limit,
            read_limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one operation. Returns `false` if the account's budget for
    /// this class is exhausted in the current window.
    pub fn check(&self, account: AccountId, class: OpClass) -> bool {
        let limit = match class {
            OpClass::Send => self.send_limit,
            OpClass::Read => self.read_limit,
        };
        let now = Instant::now();

        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = windows
            .entry((account.get(), class))
            .or_insert(Window {
                started: now,
                count: 0,
            });
        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }
        if window.count >= limit {
            return false;
        }
        window.count += 1;
        true
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(n: u64) -> AccountId {
        AccountId::new(n).unwrap()
    }

    #[test]
    fn test_budget_enforced() {
        let limiter = RateLimiter::with_limits(30, 120, DEFAULT_WINDOW);
        for _ in 0..30 {
            assert!(limiter.check(account(1), OpClass::Send));
        }
        assert!(!limiter.check(account(1), OpClass::Send));
    }

    #[test]
    fn test_classes_are_independent() {
        let limiter = RateLimiter::with_limits(1, 2, DEFAULT_WINDOW);
        assert!(limiter.check(account(1), OpClass::Send));
        assert!(!limiter.check(account(1), OpClass::Send));

        assert!(limiter.check(account(1), OpClass::Read));
        assert!(limiter.check(account(1), OpClass::Read));
        assert!(!limiter.check(account(1), OpClass::Read));
    }

    #[test]
    fn test_accounts_are_independent() {
        let limiter = RateLimiter::with_limits(1, 1, DEFAULT_WINDOW);
        assert!(limiter.check(account(1), OpClass::Send));
        assert!(!limiter.check(account(1), OpClass::Send));
        assert!(limiter.check(account(2), OpClass::Send));
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::with_limits(1, 1, Duration::from_millis(10));
        assert!(limiter.check(account(1), OpClass::Send));
        assert!(!limiter.check(account(1), OpClass::Send));

        std::thread::sleep(Duration::from_millis(15));
        assert!(limiter.check(account(1), OpClass::Send));
    }
}
