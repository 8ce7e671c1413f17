//! Sliding-window rate limiter with exponential backoff
//!
//! Guards calls to quota-constrained external providers. `acquire` returns
//! only when a call may proceed: at most `max_requests_per_window` calls per
//! window, and after a reported rate-limit response the next caller sleeps
//! out the current backoff before re-entering the window.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub max_requests_per_window: usize,
    pub window_duration: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl RateLimiterConfig {
    pub fn new(max_requests_per_window: usize, window_duration: Duration) -> Self {
        Self {
            max_requests_per_window,
            window_duration,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

struct LimiterState {
    /// Completion times of requests admitted inside the current window
    window: VecDeque<Instant>,
    /// Backoff to apply on the next acquire, when armed
    backoff_armed: bool,
    current_backoff: Duration,
}

/// Process-wide limiter; internally serialized, fair to concurrent callers
pub struct RateLimiter {
    config: RateLimiterConfig,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let current_backoff = config.initial_backoff;
        Self {
            config,
            state: Mutex::new(LimiterState {
                window: VecDeque::new(),
                backoff_armed: false,
                current_backoff,
            }),
        }
    }

    /// Wait until a call may proceed
    ///
    /// Sleeps happen outside the state lock; woken callers re-compete for a
    /// slot, and the tokio mutex's FIFO queue keeps any one caller from
    /// starving.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                if state.backoff_armed {
                    // Consume the arm: this caller serves the penalty, then
                    // the backoff escalates for the next report
                    state.backoff_armed = false;
                    let penalty = state.current_backoff;
                    let escalated = state
                        .current_backoff
                        .mul_f64(self.config.backoff_multiplier);
                    state.current_backoff = escalated.min(self.config.max_backoff);
                    warn!("rate limiter backing off for {:?}", penalty);
                    Some(penalty)
                } else {
                    while let Some(front) = state.window.front() {
                        if now.duration_since(*front) >= self.config.window_duration {
                            state.window.pop_front();
                        } else {
                            break;
                        }
                    }
                    if state.window.len() < self.config.max_requests_per_window {
                        state.window.push_back(now);
                        None
                    } else {
                        let front = *state.window.front().expect("window is non-empty");
                        Some(self.config.window_duration - now.duration_since(front))
                    }
                }
            };

            match wait {
                None => return,
                Some(duration) => {
                    debug!("rate limiter waiting {:?}", duration);
                    tokio::time::sleep(duration).await;
                }
            }
        }
    }

    /// The provider answered normally; backoff resets to its initial value
    pub async fn report_success(&self) {
        let mut state = self.state.lock().await;
        state.backoff_armed = false;
        state.current_backoff = self.config.initial_backoff;
    }

    /// The provider answered with a rate-limit response
    pub async fn report_rate_limit(&self) {
        let mut state = self.state.lock().await;
        state.backoff_armed = true;
    }

    /// Current backoff the next armed acquire would serve
    pub async fn current_backoff(&self) -> Duration {
        self.state.lock().await.current_backoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(max: usize, window_secs: u64) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(RateLimiterConfig::new(
            max,
            Duration::from_secs(window_secs),
        )))
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_admits_up_to_cap_immediately() {
        let limiter = limiter(10, 60);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pressure_releases_at_window_rollover() {
        // 25 concurrent acquires against {max=10, window=60s}: 10 now,
        // 10 at ~60s, the last 5 at ~120s.
        let limiter = limiter(10, 60);
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..25 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                start.elapsed()
            }));
        }

        let mut elapsed: Vec<Duration> = Vec::new();
        for handle in handles {
            elapsed.push(handle.await.unwrap());
        }
        elapsed.sort();

        assert!(elapsed[9] < Duration::from_secs(1));
        assert!(elapsed[10] >= Duration::from_secs(59));
        assert!(elapsed[19] < Duration::from_secs(61));
        assert!(elapsed[20] >= Duration::from_secs(119));
        assert!(elapsed[24] < Duration::from_secs(121));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_applies_and_escalates() {
        let limiter = limiter(100, 60);
        limiter.acquire().await;
        limiter.report_rate_limit().await;

        let start = Instant::now();
        limiter.acquire().await;
        // Default initial backoff of 2s was served
        assert!(start.elapsed() >= Duration::from_secs(2));
        // And the next penalty doubled
        assert_eq!(limiter.current_backoff().await, Duration::from_secs(4));

        // Without a new report, subsequent acquires pay no penalty
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_caps_and_resets() {
        let limiter = limiter(100, 60);
        for _ in 0..8 {
            limiter.report_rate_limit().await;
            limiter.acquire().await;
        }
        // 2 -> 4 -> 8 -> 16 -> 32 -> 60 (capped)
        assert_eq!(limiter.current_backoff().await, Duration::from_secs(60));

        limiter.report_success().await;
        assert_eq!(limiter.current_backoff().await, Duration::from_secs(2));
    }
}
