//! Sliding-window call throttling for the HTTP clients. The reconciliation
//! engine itself never rate-limits; it just blocks on the collaborator call.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, period: Duration) -> Self {
        Self {
            max_calls,
            period,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// Block until another call is allowed, then record it.
    pub fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().expect("rate limiter poisoned");
                let now = Instant::now();
                while calls
                    .front()
                    .is_some_and(|&t| now.duration_since(t) >= self.period)
                {
                    calls.pop_front();
                }
                if calls.len() < self.max_calls {
                    calls.push_back(now);
                    return;
                }
                // Sleep until the oldest call ages out of the window.
                self.period - now.duration_since(*calls.front().expect("non-empty"))
            };
            thread::sleep(wait);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_limit_does_not_block() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let start = Instant::now();
        limiter.acquire();
        limiter.acquire();
        limiter.acquire();
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_over_limit_blocks_for_window() {
        let limiter = RateLimiter::new(2, Duration::from_millis(50));
        limiter.acquire();
        limiter.acquire();
        let start = Instant::now();
        limiter.acquire();
        assert!(start.elapsed() >= Duration::from_millis(25));
    }
}
