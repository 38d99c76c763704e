// Circuit Breaker - failure isolation state machine

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::constants::{
    BREAKER_HISTORY_CAP, DEFAULT_FAILURE_THRESHOLD, DEFAULT_HALF_OPEN_MAX_CALLS,
    DEFAULT_RECOVERY_TIMEOUT, DEFAULT_SUCCESS_THRESHOLD,
};
use crate::error::{AppError, Result};

/// States of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Blocking requests
    Open,
    /// Testing whether the dependency recovered
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Configuration for one circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// Successes needed to close from half-open
    pub success_threshold: u32,
    /// Time before an open circuit admits a trial call
    pub recovery_timeout: Duration,
    /// Max trial calls while half-open
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            half_open_max_calls: DEFAULT_HALF_OPEN_MAX_CALLS,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0
            || self.success_threshold == 0
            || self.half_open_max_calls == 0
        {
            return Err(AppError::Validation(
                "circuit breaker thresholds must be > 0".into(),
            ));
        }
        if self.recovery_timeout.is_zero() {
            return Err(AppError::Validation("recovery_timeout must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct RequestRecord {
    success: bool,
    duration_ms: i64,
}

struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    half_open_calls: u32,
    last_failure: Option<Instant>,
    history: VecDeque<RequestRecord>,
}

/// Breaker metrics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct BreakerMetrics {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub recent_total: usize,
    pub recent_failed: usize,
    pub recent_success_rate: f64,
    pub average_duration_ms: f64,
}

/// Per-identifier failure-isolation state machine.
///
/// The whole check-then-transition sequence runs inside one critical
/// section, so two concurrent callers can never both observe a closed
/// circuit during a transition.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                half_open_calls: 0,
                last_failure: None,
                history: VecDeque::with_capacity(BREAKER_HISTORY_CAP),
            }),
        })
    }

    /// Admit or reject a request; on rejection, returns the current state.
    ///
    /// OPEN transitions to HALF_OPEN here once the recovery timeout has
    /// elapsed since the last failure; the admitted caller is the first
    /// trial request.
    pub fn try_acquire(&self) -> std::result::Result<(), CircuitState> {
        let mut s = self.state.lock().map_err(|_| CircuitState::Open)?;
        match s.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed_recovery = s
                    .last_failure
                    .map(|at| at.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if elapsed_recovery {
                    info!(state = %CircuitState::HalfOpen, "Circuit transitioning for trial calls");
                    s.state = CircuitState::HalfOpen;
                    s.failure_count = 0;
                    s.success_count = 0;
                    s.half_open_calls = 1;
                    Ok(())
                } else {
                    Err(CircuitState::Open)
                }
            }
            CircuitState::HalfOpen => {
                if s.half_open_calls < self.config.half_open_max_calls {
                    s.half_open_calls += 1;
                    Ok(())
                } else {
                    Err(CircuitState::HalfOpen)
                }
            }
        }
    }

    /// Record a successful operation
    pub fn record_success(&self, duration_ms: i64) {
        let Ok(mut s) = self.state.lock() else { return };
        push_history(&mut s.history, RequestRecord { success: true, duration_ms });

        match s.state {
            CircuitState::HalfOpen => {
                s.success_count += 1;
                if s.success_count >= self.config.success_threshold {
                    info!("Circuit closed after successful trial calls");
                    s.state = CircuitState::Closed;
                    s.failure_count = 0;
                    s.success_count = 0;
                    s.half_open_calls = 0;
                }
            }
            CircuitState::Closed => {
                // Consecutive-failure counter resets on success
                s.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed operation
    pub fn record_failure(&self, duration_ms: i64) {
        let Ok(mut s) = self.state.lock() else { return };
        push_history(&mut s.history, RequestRecord { success: false, duration_ms });

        s.failure_count += 1;
        s.last_failure = Some(Instant::now());

        match s.state {
            CircuitState::Closed => {
                if s.failure_count >= self.config.failure_threshold {
                    info!(failures = s.failure_count, "Circuit opened");
                    s.state = CircuitState::Open;
                    s.success_count = 0;
                    s.half_open_calls = 0;
                }
            }
            CircuitState::HalfOpen => {
                // Any failure during trial re-opens immediately
                info!("Circuit re-opened after failed trial call");
                s.state = CircuitState::Open;
                s.success_count = 0;
                s.half_open_calls = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
            .lock()
            .map(|s| s.state)
            .unwrap_or(CircuitState::Open)
    }

    pub fn metrics(&self) -> BreakerMetrics {
        let s = match self.state.lock() {
            Ok(s) => s,
            Err(_) => {
                return BreakerMetrics {
                    state: CircuitState::Open,
                    failure_count: 0,
                    success_count: 0,
                    recent_total: 0,
                    recent_failed: 0,
                    recent_success_rate: 0.0,
                    average_duration_ms: 0.0,
                }
            }
        };
        let total = s.history.len();
        let failed = s.history.iter().filter(|r| !r.success).count();
        let avg = if total > 0 {
            s.history.iter().map(|r| r.duration_ms as f64).sum::<f64>() / total as f64
        } else {
            0.0
        };
        BreakerMetrics {
            state: s.state,
            failure_count: s.failure_count,
            success_count: s.success_count,
            recent_total: total,
            recent_failed: failed,
            recent_success_rate: if total > 0 {
                (total - failed) as f64 / total as f64
            } else {
                0.0
            },
            average_duration_ms: avg,
        }
    }

    /// Reset to closed state, clearing all counters
    pub fn reset(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.state = CircuitState::Closed;
            s.failure_count = 0;
            s.success_count = 0;
            s.half_open_calls = 0;
            s.last_failure = None;
            s.history.clear();
        }
    }
}

fn push_history(history: &mut VecDeque<RequestRecord>, record: RequestRecord) {
    if history.len() == BREAKER_HISTORY_CAP {
        history.pop_front();
    }
    history.push_back(record);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, recovery_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold,
            success_threshold: 2,
            recovery_timeout,
            half_open_max_calls: 3,
        })
        .unwrap()
    }

    #[test]
    fn test_opens_at_failure_threshold() {
        let b = breaker(3, Duration::from_secs(60));
        b.record_failure(10);
        b.record_failure(10);
        assert_eq!(b.state(), CircuitState::Closed);
        b.record_failure(10);
        assert_eq!(b.state(), CircuitState::Open);
        assert!(b.try_acquire().is_err());
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let b = breaker(3, Duration::from_secs(60));
        b.record_failure(10);
        b.record_failure(10);
        b.record_success(10);
        b.record_failure(10);
        b.record_failure(10);
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn test_open_to_half_open_after_timeout() {
        let b = breaker(1, Duration::from_millis(20));
        b.record_failure(10);
        assert_eq!(b.state(), CircuitState::Open);
        assert!(b.try_acquire().is_err());

        std::thread::sleep(Duration::from_millis(30));
        assert!(b.try_acquire().is_ok());
        assert_eq!(b.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let b = breaker(1, Duration::from_millis(10));
        b.record_failure(10);
        std::thread::sleep(Duration::from_millis(20));
        assert!(b.try_acquire().is_ok());

        b.record_failure(10);
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[test]
    fn test_never_open_to_closed_directly() {
        // Closing requires success_threshold successes in HALF_OPEN
        let b = breaker(1, Duration::from_millis(10));
        b.record_failure(10);
        std::thread::sleep(Duration::from_millis(20));

        assert!(b.try_acquire().is_ok());
        b.record_success(10);
        assert_eq!(b.state(), CircuitState::HalfOpen);

        assert!(b.try_acquire().is_ok());
        b.record_success(10);
        assert_eq!(b.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_caps_trial_calls() {
        let b = breaker(1, Duration::from_millis(10));
        b.record_failure(10);
        std::thread::sleep(Duration::from_millis(20));

        // First acquire performs the OPEN -> HALF_OPEN transition and counts
        assert!(b.try_acquire().is_ok());
        assert!(b.try_acquire().is_ok());
        assert!(b.try_acquire().is_ok());
        assert_eq!(b.try_acquire().unwrap_err(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_metrics_track_history() {
        let b = breaker(5, Duration::from_secs(60));
        b.record_success(100);
        b.record_failure(200);
        let m = b.metrics();
        assert_eq!(m.recent_total, 2);
        assert_eq!(m.recent_failed, 1);
        assert!((m.recent_success_rate - 0.5).abs() < f64::EPSILON);
        assert!((m.average_duration_ms - 150.0).abs() < f64::EPSILON);
    }
}
