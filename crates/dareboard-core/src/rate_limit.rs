use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const DEFAULT_FRIEND_REQUEST_LIMIT: usize = 20;
pub const DEFAULT_FRIEND_REQUEST_WINDOW: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_FRIEND_REQUEST_LIMIT,
            window: DEFAULT_FRIEND_REQUEST_WINDOW,
        }
    }
}

/// Timestamps of accepted attempts inside the rolling window.
#[derive(Debug, Default)]
pub struct SlidingWindow {
    stamps: VecDeque<Instant>,
}

impl SlidingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt at `now` if the window has room. Refused attempts
    /// are not recorded.
    pub fn try_record(&mut self, now: Instant, config: &RateLimitConfig) -> bool {
        while let Some(&oldest) = self.stamps.front() {
            if now.saturating_duration_since(oldest) >= config.window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }

        if self.stamps.len() >= config.max_requests {
            return false;
        }
        self.stamps.push_back(now);
        true
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_past_the_limit_then_recovers() {
        let config = RateLimitConfig {
            max_requests: 3,
            window: Duration::from_secs(60),
        };
        let start = Instant::now();
        let mut window = SlidingWindow::new();

        for i in 0..3 {
            assert!(window.try_record(start + Duration::from_secs(i), &config));
        }
        assert!(!window.try_record(start + Duration::from_secs(10), &config));
        assert_eq!(window.len(), 3);

        // First stamp ages out at exactly start + 60s.
        assert!(window.try_record(start + Duration::from_secs(60), &config));
        assert!(!window.try_record(start + Duration::from_secs(60), &config));
    }

    #[test]
    fn default_is_twenty_per_hour() {
        let config = RateLimitConfig::default();
        let now = Instant::now();
        let mut window = SlidingWindow::new();
        for _ in 0..20 {
            assert!(window.try_record(now, &config));
        }
        assert!(!window.try_record(now + Duration::from_secs(3599), &config));
        assert!(window.try_record(now + Duration::from_secs(3600), &config));
    }
}
