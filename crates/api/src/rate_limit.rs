use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: usize,
}

/// Fixed-window request counter keyed by client.
#[derive(Debug, Clone)]
pub struct ClientRateLimiter {
    windows: Arc<Mutex<HashMap<String, Window>>>,
    window: Duration,
    max_requests: usize,
}

impl ClientRateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            window,
            max_requests,
        }
    }

    pub fn allow(&self, client: &str) -> bool {
        self.allow_at(client, Instant::now())
    }

    fn allow_at(&self, client: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock();

        // Drop idle clients so the map does not grow without bound.
        windows.retain(|_, window| now.duration_since(window.started) < self.window);

        let window = windows.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if window.count >= self.max_requests {
            return false;
        }
        window.count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_limit_within_window() {
        let limiter = ClientRateLimiter::new(Duration::from_secs(60), 2);
        let now = Instant::now();
        assert!(limiter.allow_at("10.0.0.1", now));
        assert!(limiter.allow_at("10.0.0.1", now));
        assert!(!limiter.allow_at("10.0.0.1", now));
        assert!(limiter.allow_at("10.0.0.2", now));
    }

    #[test]
    fn new_window_resets_the_count() {
        let limiter = ClientRateLimiter::new(Duration::from_secs(1), 1);
        let now = Instant::now();
        assert!(limiter.allow_at("local", now));
        assert!(!limiter.allow_at("local", now + Duration::from_millis(500)));
        assert!(limiter.allow_at("local", now + Duration::from_secs(1)));
    }

    #[test]
    fn zero_limit_rejects_everything() {
        let limiter = ClientRateLimiter::new(Duration::from_secs(60), 0);
        assert!(!limiter.allow("local"));
    }
}
