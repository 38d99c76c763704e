// Central Error Type for the Application

use thiserror::Error;

use crate::application::resource::ResourceKind;
use crate::domain::BackendId;
use crate::port::backend_adapter::BackendError;

/// Outcome of one candidate attempt inside the generation engine.
///
/// Collected so that an exhausted candidate set can be reported as a
/// multi-cause failure instead of only the last error.
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub backend: BackendId,
    pub reason: String,
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.backend, self.reason)
    }
}

fn join_attempts(attempts: &[AttemptFailure]) -> String {
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No eligible backend for this configuration")]
    NoEligibleBackend,

    #[error("Rate limit exceeded for {identifier}")]
    RateLimited { identifier: String },

    #[error("Circuit breaker is {state} for {identifier}")]
    CircuitOpen { identifier: String, state: String },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("All candidate backends failed: [{}]", join_attempts(.attempts))]
    AllBackendsFailed { attempts: Vec<AttemptFailure> },

    #[error("Resource exhausted: {amount} of {kind} not granted within timeout")]
    ResourceExhausted { kind: ResourceKind, amount: f64 },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Task cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Fatal errors never enter a retry/fallback path.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::Domain(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
