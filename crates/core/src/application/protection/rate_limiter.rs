// Rate Limiter - sliding window and token bucket strategies

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Rate limiting strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStrategy {
    SlidingWindow,
    TokenBucket,
}

/// Configuration for one rate limiter
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    pub strategy: RateLimitStrategy,
    /// Burst ceiling for the token bucket (defaults to max_requests)
    pub burst_size: Option<u32>,
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(AppError::Validation("max_requests must be > 0".into()));
        }
        if self.window.is_zero() {
            return Err(AppError::Validation("window must be > 0".into()));
        }
        if let Some(burst) = self.burst_size {
            if burst < self.max_requests {
                return Err(AppError::Validation(
                    "burst_size must be >= max_requests".into(),
                ));
            }
        }
        Ok(())
    }
}

enum LimiterState {
    /// Timestamps of admitted requests within the current window
    SlidingWindow { admitted: VecDeque<Instant> },
    /// Continuously refilled token count
    TokenBucket { tokens: f64, last_refill: Instant },
}

/// Per-identifier admission limiter.
///
/// Guarantee: over any window-length interval, no more than `max_requests`
/// admissions occur (exactly for the sliding window; bounded by burst size
/// for the token bucket).
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        config.validate()?;
        let state = match config.strategy {
            RateLimitStrategy::SlidingWindow => LimiterState::SlidingWindow {
                admitted: VecDeque::new(),
            },
            RateLimitStrategy::TokenBucket => LimiterState::TokenBucket {
                tokens: config.burst_size.unwrap_or(config.max_requests) as f64,
                last_refill: Instant::now(),
            },
        };
        Ok(Self {
            config,
            state: Mutex::new(state),
        })
    }

    /// Check-and-record: admit iff the strategy allows it right now.
    pub fn is_allowed(&self) -> bool {
        let mut state = match self.state.lock() {
            Ok(s) => s,
            Err(_) => return false,
        };
        let now = Instant::now();

        match &mut *state {
            LimiterState::SlidingWindow { admitted } => {
                while let Some(oldest) = admitted.front() {
                    if now.duration_since(*oldest) >= self.config.window {
                        admitted.pop_front();
                    } else {
                        break;
                    }
                }
                if (admitted.len() as u32) < self.config.max_requests {
                    admitted.push_back(now);
                    true
                } else {
                    false
                }
            }
            LimiterState::TokenBucket { tokens, last_refill } => {
                let elapsed = now.duration_since(*last_refill).as_secs_f64();
                let refill_rate =
                    self.config.max_requests as f64 / self.config.window.as_secs_f64();
                let ceiling = self.config.burst_size.unwrap_or(self.config.max_requests) as f64;

                *tokens = (*tokens + elapsed * refill_rate).min(ceiling);
                *last_refill = now;

                if *tokens >= 1.0 {
                    *tokens -= 1.0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Remaining admissions before the limiter rejects (for monitoring)
    pub fn remaining_quota(&self) -> u32 {
        let mut state = match self.state.lock() {
            Ok(s) => s,
            Err(_) => return 0,
        };
        let now = Instant::now();

        match &mut *state {
            LimiterState::SlidingWindow { admitted } => {
                while let Some(oldest) = admitted.front() {
                    if now.duration_since(*oldest) >= self.config.window {
                        admitted.pop_front();
                    } else {
                        break;
                    }
                }
                self.config.max_requests.saturating_sub(admitted.len() as u32)
            }
            LimiterState::TokenBucket { tokens, .. } => *tokens as u32,
        }
    }

    /// Clear all admission state
    pub fn reset(&self) {
        if let Ok(mut state) = self.state.lock() {
            match &mut *state {
                LimiterState::SlidingWindow { admitted } => admitted.clear(),
                LimiterState::TokenBucket { tokens, last_refill } => {
                    *tokens = self.config.burst_size.unwrap_or(self.config.max_requests) as f64;
                    *last_refill = Instant::now();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sliding(max: u32, window: Duration) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests: max,
            window,
            strategy: RateLimitStrategy::SlidingWindow,
            burst_size: None,
        })
        .unwrap()
    }

    fn bucket(max: u32, window: Duration, burst: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests: max,
            window,
            strategy: RateLimitStrategy::TokenBucket,
            burst_size: Some(burst),
        })
        .unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(RateLimitConfig {
            max_requests: 0,
            window: Duration::from_secs(1),
            strategy: RateLimitStrategy::SlidingWindow,
            burst_size: None,
        }
        .validate()
        .is_err());

        assert!(RateLimitConfig {
            max_requests: 10,
            window: Duration::from_secs(1),
            strategy: RateLimitStrategy::TokenBucket,
            burst_size: Some(5),
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_sliding_window_caps_admissions() {
        let limiter = sliding(5, Duration::from_secs(60));
        for _ in 0..5 {
            assert!(limiter.is_allowed());
        }
        assert!(!limiter.is_allowed());
        assert_eq!(limiter.remaining_quota(), 0);
    }

    #[test]
    fn test_sliding_window_frees_after_window() {
        let limiter = sliding(2, Duration::from_millis(50));
        assert!(limiter.is_allowed());
        assert!(limiter.is_allowed());
        assert!(!limiter.is_allowed());

        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.is_allowed());
    }

    #[test]
    fn test_token_bucket_burst_then_reject() {
        // Six instantaneous calls admit exactly five
        let limiter = bucket(5, Duration::from_secs(1), 5);
        let admitted = (0..6).filter(|_| limiter.is_allowed()).count();
        assert_eq!(admitted, 5);
    }

    #[test]
    fn test_token_bucket_refills_continuously() {
        let limiter = bucket(10, Duration::from_millis(100), 10);
        for _ in 0..10 {
            assert!(limiter.is_allowed());
        }
        assert!(!limiter.is_allowed());

        // 100ms window at 10 req/window -> one token every 10ms
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.is_allowed());
    }

    #[test]
    fn test_reset_restores_quota() {
        let limiter = sliding(1, Duration::from_secs(60));
        assert!(limiter.is_allowed());
        assert!(!limiter.is_allowed());
        limiter.reset();
        assert!(limiter.is_allowed());
    }
}
