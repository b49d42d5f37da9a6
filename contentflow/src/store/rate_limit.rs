//! Fixed-window rate limiting per client.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Counts requests per client in fixed windows.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    /// Allows `max_requests` per client in every `window`.
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: DashMap::new(),
        }
    }

    /// Records one request for `client`.
    ///
    /// Returns the requests left in the current window, or the time until
    /// the window resets when the quota is used up.
    pub fn check(&self, client: &str) -> Result<u32, Duration> {
        let now = Instant::now();
        let mut window = self.windows.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        let elapsed = now.duration_since(window.started);
        if elapsed >= self.window {
            window.started = now;
            window.count = 0;
        }

        if window.count >= self.max_requests {
            return Err(self.window.saturating_sub(now.duration_since(window.started)));
        }

        window.count += 1;
        Ok(self.max_requests - window.count)
    }

    /// Forgets the window of `client`.
    pub fn reset(&self, client: &str) {
        self.windows.remove(client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_quota_per_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));

        assert_eq!(limiter.check("alice"), Ok(1));
        assert_eq!(limiter.check("alice"), Ok(0));
        assert_eq!(limiter.check("alice"), Err(Duration::from_secs(60)));
        assert_eq!(limiter.check("bob"), Ok(1));

        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(limiter.check("alice"), Err(Duration::from_secs(15)));

        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(limiter.check("alice"), Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("alice").is_ok());
        assert!(limiter.check("alice").is_err());

        limiter.reset("alice");
        assert!(limiter.check("alice").is_ok());
    }
}
