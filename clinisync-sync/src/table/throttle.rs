//! Sliding-window rate limiter.
//!
//! Each admitted call records its timestamp. When the window already holds
//! `max_requests` timestamps the caller blocks until the oldest one leaves the
//! window. Calls are admitted strictly in arrival order.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use clinisync_core::settings::ThrottleSettings;

use crate::clock::Clock;

#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    stamps: VecDeque<Instant>,
}

impl RateLimiter {
    /// `max_requests` is clamped to at least one.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            max_requests,
            window,
            stamps: VecDeque::with_capacity(max_requests),
        }
    }

    pub fn from_settings(settings: &ThrottleSettings) -> Self {
        Self::new(
            settings.max_requests,
            Duration::from_secs(settings.window_secs),
        )
    }

    /// Block until a slot is free, then record the call. Returns the time spent
    /// waiting.
    pub fn acquire(&mut self, clock: &dyn Clock) -> Duration {
        let mut waited = Duration::ZERO;
        let now = clock.now();
        self.evict(now);

        if self.stamps.len() >= self.max_requests {
            if let Some(oldest) = self.stamps.front().copied() {
                let free_at = oldest + self.window;
                if free_at > now {
                    waited = free_at - now;
                    tracing::debug!("rate limit reached, waiting {:?}", waited);
                    clock.sleep(waited);
                }
            }
            self.evict(clock.now());
        }

        self.stamps.push_back(clock.now());
        waited
    }

    /// Calls currently counted against the window.
    pub fn in_window(&self) -> usize {
        self.stamps.len()
    }

    fn evict(&mut self, now: Instant) {
        while let Some(oldest) = self.stamps.front() {
            if now.duration_since(*oldest) >= self.window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_settings(&ThrottleSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn admits_up_to_limit_without_waiting() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert_eq!(limiter.acquire(&clock), Duration::ZERO);
        }
        assert_eq!(limiter.in_window(), 3);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn extra_call_waits_for_oldest_to_leave_window() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(3, Duration::from_secs(60));
        limiter.acquire(&clock);
        clock.advance(Duration::from_secs(10));
        limiter.acquire(&clock);
        limiter.acquire(&clock);
        clock.advance(Duration::from_secs(5));

        // 15s elapsed, oldest stamp leaves the window at 60s.
        let waited = limiter.acquire(&clock);
        assert_eq!(waited, Duration::from_secs(45));
        assert_eq!(clock.elapsed(), Duration::from_secs(60));
        assert_eq!(limiter.in_window(), 3);
    }

    #[test]
    fn expired_stamps_free_slots() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(2, Duration::from_secs(1));
        limiter.acquire(&clock);
        limiter.acquire(&clock);
        clock.advance(Duration::from_secs(1));
        assert_eq!(limiter.acquire(&clock), Duration::ZERO);
        assert_eq!(limiter.in_window(), 1);
    }

    #[test]
    fn zero_limit_is_clamped() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(0, Duration::from_secs(1));
        assert_eq!(limiter.acquire(&clock), Duration::ZERO);
        assert_eq!(limiter.acquire(&clock), Duration::from_secs(1));
    }
}
