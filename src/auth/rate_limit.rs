//! Per-origin attempt budgets over rolling windows.
//!
//! Enforced before any credential work so an abusive origin cannot burn
//! lookups or hashing cycles. Counters are independent of the per-identity
//! state machine: one origin hammering many usernames trips the same budget.
//! Stale windows are reset lazily on next access; there is no background
//! sweep.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

/// Attempt budget enforcement per originating client.
pub trait RateLimiter: Send + Sync {
    /// Register one attempt from `origin` and decide whether it may proceed.
    fn check(&self, origin: &str) -> RateLimitDecision;
}

/// Limiter that admits everything. For tests and trusted internal callers.
#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _origin: &str) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[derive(Clone, Copy, Debug)]
struct OriginWindows {
    hour_started: Instant,
    hour_count: u32,
    day_started: Instant,
    day_count: u32,
}

impl OriginWindows {
    fn new(now: Instant) -> Self {
        Self {
            hour_started: now,
            hour_count: 0,
            day_started: now,
            day_count: 0,
        }
    }
}

/// In-memory rolling-window limiter with hourly and daily budgets.
pub struct SlidingWindowRateLimiter {
    hourly_limit: u32,
    daily_limit: u32,
    hour_window: Duration,
    day_window: Duration,
    origins: Mutex<HashMap<String, OriginWindows>>,
}

impl SlidingWindowRateLimiter {
    #[must_use]
    pub fn new(hourly_limit: u32, daily_limit: u32) -> Self {
        Self {
            hourly_limit,
            daily_limit,
            hour_window: HOUR,
            day_window: DAY,
            origins: Mutex::new(HashMap::new()),
        }
    }

    /// Override the window lengths. Shrunk by tests to observe roll-over.
    #[must_use]
    pub fn with_windows(mut self, hour_window: Duration, day_window: Duration) -> Self {
        self.hour_window = hour_window;
        self.day_window = day_window;
        self
    }
}

impl RateLimiter for SlidingWindowRateLimiter {
    fn check(&self, origin: &str) -> RateLimitDecision {
        let mut origins = self
            .origins
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let entry = origins
            .entry(origin.to_string())
            .or_insert_with(|| OriginWindows::new(now));

        // lazy reset once a window has rolled past
        if now.duration_since(entry.hour_started) >= self.hour_window {
            entry.hour_started = now;
            entry.hour_count = 0;
        }
        if now.duration_since(entry.day_started) >= self.day_window {
            entry.day_started = now;
            entry.day_count = 0;
        }

        if entry.hour_count >= self.hourly_limit || entry.day_count >= self.daily_limit {
            return RateLimitDecision::Limited;
        }
        entry.hour_count += 1;
        entry.day_count += 1;
        RateLimitDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        assert_eq!(limiter.check("10.0.0.1"), RateLimitDecision::Allowed);
    }

    #[test]
    fn budget_exhaustion_limits_only_that_origin() {
        let limiter = SlidingWindowRateLimiter::new(2, 100);
        assert_eq!(limiter.check("10.0.0.1"), RateLimitDecision::Allowed);
        assert_eq!(limiter.check("10.0.0.1"), RateLimitDecision::Allowed);
        assert_eq!(limiter.check("10.0.0.1"), RateLimitDecision::Limited);
        // other origins keep their own budget
        assert_eq!(limiter.check("10.0.0.2"), RateLimitDecision::Allowed);
    }

    #[test]
    fn daily_budget_caps_across_hourly_windows() {
        let limiter = SlidingWindowRateLimiter::new(100, 1);
        assert_eq!(limiter.check("10.0.0.1"), RateLimitDecision::Allowed);
        assert_eq!(limiter.check("10.0.0.1"), RateLimitDecision::Limited);
    }

    #[test]
    fn window_roll_over_restores_the_budget() {
        let limiter = SlidingWindowRateLimiter::new(1, 100)
            .with_windows(Duration::from_millis(30), Duration::from_secs(60));
        assert_eq!(limiter.check("10.0.0.1"), RateLimitDecision::Allowed);
        assert_eq!(limiter.check("10.0.0.1"), RateLimitDecision::Limited);

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(limiter.check("10.0.0.1"), RateLimitDecision::Allowed);
    }
}
