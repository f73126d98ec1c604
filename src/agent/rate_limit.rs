use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-window request counter.
///
/// Not synchronized: one caller owns it. The window outlives the process
/// through [`RateLimiter::restore`] and [`RateLimiter::timestamps_ms`],
/// which convert to and from wall-clock milliseconds.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    requests: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: VecDeque::new(),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn can_make_request(&mut self) -> bool {
        self.can_make_request_at(Instant::now())
    }

    pub fn record_request(&mut self) {
        self.record_request_at(Instant::now());
    }

    pub fn can_make_request_at(&mut self, now: Instant) -> bool {
        self.prune(now);
        self.requests.len() < self.max_requests
    }

    pub fn record_request_at(&mut self, now: Instant) {
        self.requests.push_back(now);
    }

    /// Requests still counted against the window.
    pub fn in_window(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.requests.len()
    }

    /// Seed the window from wall-clock timestamps (Unix ms) saved by an
    /// earlier run. Stamps older than the window are dropped; stamps in
    /// the future count as "now".
    pub fn restore(&mut self, stamps_ms: &[i64], now: Instant, now_ms: i64) {
        let window_ms = self.window.as_millis() as i64;
        let restored = stamps_ms
            .iter()
            .map(|&stamp| (now_ms - stamp).max(0))
            .filter(|&age| age < window_ms)
            .map(|age| {
                now.checked_sub(Duration::from_millis(age as u64))
                    .unwrap_or(now)
            });
        self.requests.extend(restored);
        self.requests.make_contiguous().sort();
    }

    /// Requests still in the window as Unix ms, oldest first.
    pub fn timestamps_ms(&self, now: Instant, now_ms: i64) -> Vec<i64> {
        self.requests
            .iter()
            .map(|&at| now.saturating_duration_since(at))
            .filter(|&age| age < self.window)
            .map(|age| now_ms - age.as_millis() as i64)
            .collect()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.requests.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(120, Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_at_exactly_max_requests() {
        let mut limiter = RateLimiter::default();
        let now = Instant::now();

        for _ in 0..120 {
            assert!(limiter.can_make_request_at(now));
            limiter.record_request_at(now);
        }
        assert!(!limiter.can_make_request_at(now));
        assert_eq!(limiter.in_window(now), 120);
    }

    #[test]
    fn old_requests_leave_the_window() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        limiter.record_request_at(start);
        limiter.record_request_at(start + Duration::from_secs(30));
        assert!(!limiter.can_make_request_at(start + Duration::from_secs(59)));

        // The first request expires after a full window
        assert!(limiter.can_make_request_at(start + Duration::from_secs(60)));
        assert_eq!(limiter.in_window(start + Duration::from_secs(60)), 1);
        assert_eq!(limiter.in_window(start + Duration::from_secs(91)), 0);
    }

    #[test]
    fn window_carries_over_through_timestamps() {
        let start = Instant::now();
        let now = start + Duration::from_secs(90);
        let now_ms = 1_700_000_000_000;

        let mut first = RateLimiter::new(2, Duration::from_secs(60));
        first.record_request_at(start);
        first.record_request_at(start + Duration::from_secs(70));
        first.record_request_at(now);
        let stamps = first.timestamps_ms(now, now_ms);
        assert_eq!(stamps, vec![now_ms - 20_000, now_ms]);

        // A later run picks the saved stamps back up
        let mut second = RateLimiter::new(2, Duration::from_secs(60));
        second.restore(&stamps, now, now_ms);
        assert!(!second.can_make_request_at(now));
        assert!(second.can_make_request_at(now + Duration::from_secs(41)));
    }

    #[test]
    fn restore_skips_expired_stamps() {
        let now = Instant::now();
        let mut limiter = RateLimiter::new(5, Duration::from_secs(60));
        limiter.restore(&[0, 1_000, 61_000, 200_000], now, 120_000);
        // 61 s and 200 s (in the future) remain
        assert_eq!(limiter.in_window(now), 2);
    }
}
