//! Rate limiting and adaptive backoff for LLM compression calls.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Static rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Calls allowed per sliding minute.
    pub requests_per_minute: u32,
    /// Calls allowed per sliding hour.
    pub requests_per_hour: u32,
    /// Base of the exponential backoff.
    pub backoff_multiplier: f64,
    /// Cap on a single backoff interval, seconds.
    pub max_backoff_seconds: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 10,
            requests_per_hour: 100,
            backoff_multiplier: 2.0,
            max_backoff_seconds: 300.0,
        }
    }
}

/// Sliding-window rate limiter with exponential backoff.
///
/// On each error the consecutive-error counter grows and the next call is
/// delayed by `multiplier^consecutive` seconds, capped at
/// `max_backoff_seconds`; a success resets the counter. Auto-tuning lowers
/// the per-minute ceiling when the observed error rate is high and restores
/// it toward the configured ceiling on sustained success.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    /// Auto-tuned ceiling, never above `config.requests_per_minute`.
    current_per_minute: u32,
    minute_window: VecDeque<Instant>,
    hour_window: VecDeque<Instant>,
    consecutive_errors: u32,
    backoff_until: Option<Instant>,
    total_calls: u64,
    total_errors: u64,
}

/// Minimum per-minute ceiling auto-tuning will not go below.
const MIN_PER_MINUTE: u32 = 5;

impl RateLimiter {
    /// Create a limiter from its configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            current_per_minute: config.requests_per_minute,
            config,
            minute_window: VecDeque::new(),
            hour_window: VecDeque::new(),
            consecutive_errors: 0,
            backoff_until: None,
            total_calls: 0,
            total_errors: 0,
        }
    }

    /// Try to reserve one call slot now.
    ///
    /// # Errors
    ///
    /// Returns the duration to wait when a backoff is pending or a window is
    /// full.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        let now = Instant::now();
        self.prune(now);

        if let Some(until) = self.backoff_until {
            if until > now {
                return Err(until - now);
            }
            self.backoff_until = None;
        }

        if self.minute_window.len() >= self.current_per_minute as usize {
            let oldest = self.minute_window[0];
            return Err(Duration::from_secs(60).saturating_sub(now - oldest));
        }
        if self.hour_window.len() >= self.config.requests_per_hour as usize {
            let oldest = self.hour_window[0];
            return Err(Duration::from_secs(3_600).saturating_sub(now - oldest));
        }

        self.minute_window.push_back(now);
        self.hour_window.push_back(now);
        self.total_calls += 1;
        Ok(())
    }

    /// Record a successful call, resetting the consecutive-error counter.
    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
    }

    /// Record a failed call and arm the next backoff interval.
    pub fn record_error(&mut self) {
        self.consecutive_errors += 1;
        self.total_errors += 1;
        let backoff = self
            .config
            .backoff_multiplier
            .powi(self.consecutive_errors as i32)
            .min(self.config.max_backoff_seconds);
        self.backoff_until = Some(Instant::now() + Duration::from_secs_f64(backoff));
        tracing::warn!(
            consecutive_errors = self.consecutive_errors,
            backoff_seconds = backoff,
            "compression call failed, backing off"
        );
    }

    /// Remaining backoff, if one is armed.
    #[must_use]
    pub fn backoff_remaining(&self) -> Option<Duration> {
        self.backoff_until
            .and_then(|until| until.checked_duration_since(Instant::now()))
    }

    /// Current consecutive-error count.
    #[must_use]
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Adjust the per-minute ceiling from the observed error rate.
    ///
    /// High error rates (> 30 %) cut the ceiling by 30 %; clean runs creep it
    /// back toward the configured value.
    pub fn auto_tune(&mut self) {
        if self.total_calls < 5 {
            return;
        }
        let error_rate = self.total_errors as f64 / self.total_calls as f64;
        if error_rate > 0.3 {
            let lowered = ((self.current_per_minute as f64) * 0.7) as u32;
            self.current_per_minute = lowered.max(MIN_PER_MINUTE);
            tracing::info!(
                error_rate = format!("{error_rate:.2}"),
                per_minute = self.current_per_minute,
                "auto-tuning lowered compression rate ceiling"
            );
        } else if error_rate < 0.05 && self.current_per_minute < self.config.requests_per_minute {
            self.current_per_minute += 1;
        }
    }

    /// The auto-tuned per-minute ceiling.
    #[must_use]
    pub fn per_minute_ceiling(&self) -> u32 {
        self.current_per_minute
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.minute_window.front() {
            if now - *front >= Duration::from_secs(60) {
                self.minute_window.pop_front();
            } else {
                break;
            }
        }
        while let Some(front) = self.hour_window.front() {
            if now - *front >= Duration::from_secs(3_600) {
                self.hour_window.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            requests_per_minute: 3,
            requests_per_hour: 100,
            backoff_multiplier: 2.0,
            max_backoff_seconds: 300.0,
        })
    }

    #[test]
    fn acquire_within_window_succeeds() {
        let mut limiter = limiter();
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
    }

    #[test]
    fn acquire_past_minute_window_is_delayed() {
        let mut limiter = limiter();
        for _ in 0..3 {
            limiter.try_acquire().unwrap();
        }
        let wait = limiter.try_acquire().unwrap_err();
        assert!(wait <= Duration::from_secs(60));
        assert!(wait > Duration::from_secs(50));
    }

    #[test]
    fn third_error_backs_off_at_least_multiplier_cubed() {
        let mut limiter = limiter();
        limiter.record_error();
        limiter.record_error();
        limiter.record_error();
        let remaining = limiter.backoff_remaining().unwrap();
        // 2^3 = 8 seconds, allow scheduling slop.
        assert!(remaining >= Duration::from_secs_f64(7.5));
        assert!(limiter.try_acquire().is_err());
    }

    #[test]
    fn backoff_is_capped() {
        let mut limiter = RateLimiter::new(RateLimitConfig {
            max_backoff_seconds: 10.0,
            ..Default::default()
        });
        for _ in 0..20 {
            limiter.record_error();
        }
        assert!(limiter.backoff_remaining().unwrap() <= Duration::from_secs(10));
    }

    #[test]
    fn success_resets_consecutive_errors() {
        let mut limiter = limiter();
        limiter.record_error();
        limiter.record_error();
        assert_eq!(limiter.consecutive_errors(), 2);
        limiter.record_success();
        assert_eq!(limiter.consecutive_errors(), 0);
    }

    #[test]
    fn auto_tune_lowers_ceiling_under_errors() {
        let mut limiter = RateLimiter::new(RateLimitConfig {
            requests_per_minute: 20,
            ..Default::default()
        });
        // 5 calls, 3 errors: 60% error rate.
        for _ in 0..5 {
            let _ = limiter.try_acquire();
        }
        for _ in 0..3 {
            limiter.record_error();
        }
        limiter.auto_tune();
        assert_eq!(limiter.per_minute_ceiling(), 14);
        // Never below the floor.
        for _ in 0..20 {
            limiter.auto_tune();
        }
        assert!(limiter.per_minute_ceiling() >= MIN_PER_MINUTE);
    }
}
