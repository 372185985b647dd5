//! Minimum-interval gate for published spectra

use std::time::{Duration, Instant};

/// Lets at most one event through per `min_interval`.
///
/// Piggybacks on the window-fill cadence; there is no timer thread.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Try to pass the gate at `now`. On success `now` becomes the new
    /// reference point; on failure nothing changes.
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last = Some(now);
        true
    }

    /// Forget the last pass, as if nothing was ever dispatched.
    pub fn clear(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_acquire_always_passes() {
        let mut limiter = RateLimiter::new(Duration::from_millis(50));
        assert_eq!(limiter.min_interval(), Duration::from_millis(50));
        assert!(limiter.try_acquire_at(Instant::now()));
    }

    #[test]
    fn events_inside_interval_are_dropped() {
        let mut limiter = RateLimiter::new(Duration::from_millis(50));
        let t0 = Instant::now();

        assert!(limiter.try_acquire_at(t0));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_millis(10)));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_millis(49)));
        assert!(limiter.try_acquire_at(t0 + Duration::from_millis(50)));
    }

    #[test]
    fn dropped_events_do_not_move_reference_point() {
        let mut limiter = RateLimiter::new(Duration::from_millis(50));
        let t0 = Instant::now();

        assert!(limiter.try_acquire_at(t0));
        for ms in (5..50).step_by(5) {
            assert!(!limiter.try_acquire_at(t0 + Duration::from_millis(ms)));
        }
        assert!(limiter.try_acquire_at(t0 + Duration::from_millis(51)));
    }

    #[test]
    fn at_most_one_pass_per_sliding_interval() {
        let interval = Duration::from_millis(50);
        let mut limiter = RateLimiter::new(interval);
        let t0 = Instant::now();

        // A window fill every ~10.7ms (512 samples at 48kHz) for one second
        let passes: Vec<Instant> = (0..94)
            .map(|i| t0 + Duration::from_micros(i * 10_667))
            .filter(|&t| limiter.try_acquire_at(t))
            .collect();

        assert!(!passes.is_empty());
        for pair in passes.windows(2) {
            assert!(pair[1] - pair[0] >= interval);
        }
    }

    #[test]
    fn clear_allows_immediate_pass() {
        let mut limiter = RateLimiter::new(Duration::from_secs(60));
        let t0 = Instant::now();

        assert!(limiter.try_acquire_at(t0));
        assert!(!limiter.try_acquire_at(t0));
        limiter.clear();
        assert!(limiter.try_acquire_at(t0));
    }
}
