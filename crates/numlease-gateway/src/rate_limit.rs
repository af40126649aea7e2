//! Per-account sliding-window rate limiter.

use std::collections::{HashMap, VecDeque};

use numlease_types::{AccountId, LeaseError, RateLimitConfig, Result};

/// Counts calls per account over the last `window_ms` milliseconds.
#[derive(Debug)]
pub struct RateLimiter {
    /// `AccountId → timestamps of recent calls` (monotonically increasing)
    windows: HashMap<AccountId, VecDeque<u64>>,
    window_ms: u64,
    max_calls: usize,
    /// When idle accounts were last dropped.
    last_prune_ms: u64,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: HashMap::new(),
            window_ms: config.window_ms,
            max_calls: config.max_calls,
            last_prune_ms: 0,
        }
    }

    /// Record a call at `now_ms` if the account is under its limit.
    ///
    /// Once per window, accounts with no recent call are forgotten.
    pub fn check_and_record(&mut self, account: AccountId, now_ms: u64) -> Result<()> {
        if now_ms.saturating_sub(self.last_prune_ms) >= self.window_ms {
            self.prune(now_ms);
            self.last_prune_ms = now_ms;
        }

        let window = self.windows.entry(account).or_default();

        let window_ms = self.window_ms;
        while window.front().is_some_and(|&t| t + window_ms <= now_ms) {
            window.pop_front();
        }

        if window.len() >= self.max_calls {
            return Err(LeaseError::RateLimited {
                calls: window.len(),
                window_ms: self.window_ms,
            });
        }

        window.push_back(now_ms);
        Ok(())
    }

    /// Drop accounts with no call inside the window ending at `now_ms`.
    pub fn prune(&mut self, now_ms: u64) {
        let window_ms = self.window_ms;
        self.windows
            .retain(|_, w| w.back().is_some_and(|&t| t + window_ms > now_ms));
    }

    /// Calls counted for `account` right now.
    #[must_use]
    pub fn recent_calls(&self, account: AccountId) -> usize {
        self.windows.get(&account).map_or(0, VecDeque::len)
    }

    /// Accounts currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}
