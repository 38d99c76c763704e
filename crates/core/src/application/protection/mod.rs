// Protection Manager - rate limiting and circuit breaking per identifier

pub mod circuit_breaker;
pub mod rate_limiter;

pub use circuit_breaker::{BreakerMetrics, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use rate_limiter::{RateLimitConfig, RateLimitStrategy, RateLimiter};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{AppError, Result};

/// Why an identifier was rejected
#[derive(Error, Debug, Clone)]
pub enum ProtectionDenied {
    #[error("Rate limit exceeded for {identifier}")]
    RateLimited { identifier: String },

    #[error("Circuit breaker is {state} for {identifier}")]
    CircuitOpen {
        identifier: String,
        state: CircuitState,
    },
}

impl From<ProtectionDenied> for AppError {
    fn from(denied: ProtectionDenied) -> Self {
        match denied {
            ProtectionDenied::RateLimited { identifier } => AppError::RateLimited { identifier },
            ProtectionDenied::CircuitOpen { identifier, state } => AppError::CircuitOpen {
                identifier,
                state: state.to_string(),
            },
        }
    }
}

/// Snapshot of one identifier's limiter state
#[derive(Debug, Clone, Serialize)]
pub struct LimiterSnapshot {
    pub remaining_quota: u32,
}

/// Snapshot of all protection state, for the metrics surface
#[derive(Debug, Clone, Serialize, Default)]
pub struct ProtectionSnapshot {
    pub rate_limiters: HashMap<String, LimiterSnapshot>,
    pub circuit_breakers: HashMap<String, BreakerMetrics>,
}

/// Central manager for rate limiters and circuit breakers.
///
/// Identifiers are logical keys such as `backend:luma` or
/// `operation:create_task`. An identifier without a registered limiter or
/// breaker passes unconditionally.
#[derive(Default)]
pub struct ProtectionManager {
    rate_limiters: RwLock<HashMap<String, Arc<RateLimiter>>>,
    circuit_breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl ProtectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a rate limiter for an identifier
    pub fn register_rate_limiter(
        &self,
        identifier: impl Into<String>,
        config: RateLimitConfig,
    ) -> Result<()> {
        let identifier = identifier.into();
        let limiter = Arc::new(RateLimiter::new(config)?);
        info!(identifier = %identifier, "Rate limiter registered");
        self.rate_limiters
            .write()
            .map_err(|_| AppError::Internal("protection lock poisoned".into()))?
            .insert(identifier, limiter);
        Ok(())
    }

    /// Create (or replace) a circuit breaker for an identifier
    pub fn register_circuit_breaker(
        &self,
        identifier: impl Into<String>,
        config: CircuitBreakerConfig,
    ) -> Result<()> {
        let identifier = identifier.into();
        let breaker = Arc::new(CircuitBreaker::new(config)?);
        info!(identifier = %identifier, "Circuit breaker registered");
        self.circuit_breakers
            .write()
            .map_err(|_| AppError::Internal("protection lock poisoned".into()))?
            .insert(identifier, breaker);
        Ok(())
    }

    fn limiter(&self, identifier: &str) -> Option<Arc<RateLimiter>> {
        self.rate_limiters.read().ok()?.get(identifier).cloned()
    }

    fn breaker(&self, identifier: &str) -> Option<Arc<CircuitBreaker>> {
        self.circuit_breakers.read().ok()?.get(identifier).cloned()
    }

    /// Check both rate limiting and circuit breaking for an identifier.
    ///
    /// The rate limiter runs first; the first mechanism that rejects
    /// determines the reason.
    pub fn check_protection(
        &self,
        identifier: &str,
    ) -> std::result::Result<(), ProtectionDenied> {
        if let Some(limiter) = self.limiter(identifier) {
            if !limiter.is_allowed() {
                debug!(identifier = %identifier, "Admission rejected by rate limiter");
                return Err(ProtectionDenied::RateLimited {
                    identifier: identifier.to_string(),
                });
            }
        }

        if let Some(breaker) = self.breaker(identifier) {
            if let Err(state) = breaker.try_acquire() {
                debug!(identifier = %identifier, state = %state, "Admission rejected by circuit breaker");
                return Err(ProtectionDenied::CircuitOpen {
                    identifier: identifier.to_string(),
                    state,
                });
            }
        }

        Ok(())
    }

    /// Record a successful call for the identifier's breaker
    pub fn record_success(&self, identifier: &str, duration_ms: i64) {
        if let Some(breaker) = self.breaker(identifier) {
            breaker.record_success(duration_ms);
        }
    }

    /// Record a failed call for the identifier's breaker
    pub fn record_failure(&self, identifier: &str, duration_ms: i64) {
        if let Some(breaker) = self.breaker(identifier) {
            breaker.record_failure(duration_ms);
        }
    }

    /// Current breaker state for an identifier, if one is registered
    pub fn breaker_state(&self, identifier: &str) -> Option<CircuitState> {
        self.breaker(identifier).map(|b| b.state())
    }

    /// Snapshot of every limiter and breaker, for the metrics surface
    pub fn snapshot(&self) -> ProtectionSnapshot {
        let mut snapshot = ProtectionSnapshot::default();

        if let Ok(limiters) = self.rate_limiters.read() {
            for (id, limiter) in limiters.iter() {
                snapshot.rate_limiters.insert(
                    id.clone(),
                    LimiterSnapshot {
                        remaining_quota: limiter.remaining_quota(),
                    },
                );
            }
        }
        if let Ok(breakers) = self.circuit_breakers.read() {
            for (id, breaker) in breakers.iter() {
                snapshot.circuit_breakers.insert(id.clone(), breaker.metrics());
            }
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_unknown_identifier_passes() {
        let manager = ProtectionManager::new();
        assert!(manager.check_protection("backend:unknown").is_ok());
    }

    #[test]
    fn test_rate_limiter_rejects_first() {
        let manager = ProtectionManager::new();
        manager
            .register_rate_limiter(
                "backend:luma",
                RateLimitConfig {
                    max_requests: 1,
                    window: Duration::from_secs(60),
                    strategy: RateLimitStrategy::SlidingWindow,
                    burst_size: None,
                },
            )
            .unwrap();
        manager
            .register_circuit_breaker("backend:luma", CircuitBreakerConfig::default())
            .unwrap();

        assert!(manager.check_protection("backend:luma").is_ok());
        // Exhausted limiter wins over a closed breaker
        let denied = manager.check_protection("backend:luma").unwrap_err();
        assert!(matches!(denied, ProtectionDenied::RateLimited { .. }));
    }

    #[test]
    fn test_breaker_rejection_reason() {
        let manager = ProtectionManager::new();
        manager
            .register_circuit_breaker(
                "backend:pika",
                CircuitBreakerConfig {
                    failure_threshold: 1,
                    ..Default::default()
                },
            )
            .unwrap();

        manager.record_failure("backend:pika", 10);
        let denied = manager.check_protection("backend:pika").unwrap_err();
        assert!(matches!(denied, ProtectionDenied::CircuitOpen { .. }));
    }

    #[test]
    fn test_snapshot_covers_both_mechanisms() {
        let manager = ProtectionManager::new();
        manager
            .register_rate_limiter(
                "operation:create_task",
                RateLimitConfig {
                    max_requests: 10,
                    window: Duration::from_secs(1),
                    strategy: RateLimitStrategy::TokenBucket,
                    burst_size: Some(10),
                },
            )
            .unwrap();
        manager
            .register_circuit_breaker("backend:luma", CircuitBreakerConfig::default())
            .unwrap();

        let snapshot = manager.snapshot();
        assert!(snapshot.rate_limiters.contains_key("operation:create_task"));
        assert!(snapshot.circuit_breakers.contains_key("backend:luma"));
    }
}
