// Backend Adapter Port
// Uniform capability contract around one external generation backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BackendDescriptor, JobConfig};

/// Status of a job as reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendJobStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl BackendJobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BackendJobStatus::Completed | BackendJobStatus::Failed | BackendJobStatus::Cancelled
        )
    }
}

/// Result of a backend generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendJob {
    /// Backend-assigned job identifier
    pub job_id: String,
    pub status: BackendJobStatus,
    /// Reference to the produced artifact, present on completion
    pub result_ref: Option<String>,
    #[serde(default)]
    pub progress: f32,
}

/// Errors surfaced by a backend adapter
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Backend rate limited (retry after {retry_after_ms}ms)")]
    RateLimited { retry_after_ms: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend call timed out after {0}ms")]
    Timeout(i64),
}

/// Uniform contract implemented by every generation backend.
///
/// The adapter owns the vendor-specific wire format and any per-call
/// timeout handling; `generate` is the single suspension point of the
/// generation engine and returns once the backend job reached a terminal
/// state (or the submission itself failed).
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Static capability metadata, consumed by the registry at registration
    fn descriptor(&self) -> BackendDescriptor;

    /// Submit a generation job and drive it to a terminal state
    async fn generate(&self, config: &JobConfig) -> Result<BackendJob, BackendError>;

    /// Poll the status of a previously submitted job
    async fn get_status(&self, job_id: &str) -> Result<BackendJob, BackendError>;

    /// Backend-specific validation beyond the descriptor-level checks
    fn validate_config(&self, config: &JobConfig) -> bool {
        self.descriptor().supports(config)
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::domain::{AspectRatio, Capability, Quality};

    /// Mock backend behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed with a result reference
        Success,
        /// Always fail with an API error message
        Fail(String),
        /// Succeed after a delay (for concurrency observation)
        Delay(Duration),
    }

    /// Mock backend adapter for testing
    pub struct MockBackend {
        descriptor: BackendDescriptor,
        behavior: Arc<Mutex<MockBehavior>>,
        calls: Arc<AtomicUsize>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl MockBackend {
        pub fn new(id: impl Into<String>, behavior: MockBehavior) -> Self {
            let id = id.into();
            Self {
                descriptor: BackendDescriptor {
                    id,
                    capabilities: BTreeSet::from([
                        Capability::TextToVideo,
                        Capability::ImageToVideo,
                    ]),
                    qualities: BTreeSet::from([
                        Quality::Hd720,
                        Quality::FullHd1080,
                        Quality::Uhd4k,
                    ]),
                    aspect_ratios: BTreeSet::from([
                        AspectRatio::Landscape,
                        AspectRatio::Portrait,
                        AspectRatio::Square,
                    ]),
                    max_duration_secs: 300.0,
                    priority_weight: 0,
                    enabled: true,
                },
                behavior: Arc::new(Mutex::new(behavior)),
                calls: Arc::new(AtomicUsize::new(0)),
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn new_success(id: impl Into<String>) -> Self {
            Self::new(id, MockBehavior::Success)
        }

        pub fn new_fail(id: impl Into<String>, message: impl Into<String>) -> Self {
            Self::new(id, MockBehavior::Fail(message.into()))
        }

        pub fn with_weight(mut self, weight: i32) -> Self {
            self.descriptor.priority_weight = weight;
            self
        }

        pub fn with_descriptor(mut self, descriptor: BackendDescriptor) -> Self {
            self.descriptor = descriptor;
            self
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        /// Number of generate() invocations observed
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// High-water mark of concurrent generate() calls
        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BackendAdapter for MockBackend {
        fn descriptor(&self) -> BackendDescriptor {
            self.descriptor.clone()
        }

        async fn generate(&self, _config: &JobConfig) -> Result<BackendJob, BackendError> {
            let seq = self.calls.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            let behavior = self.behavior.lock().unwrap().clone();
            let result = match behavior {
                MockBehavior::Success => Ok(BackendJob {
                    job_id: format!("{}-job-{}", self.descriptor.id, seq),
                    status: BackendJobStatus::Completed,
                    result_ref: Some(format!("/results/{}-{}.mp4", self.descriptor.id, seq)),
                    progress: 1.0,
                }),
                MockBehavior::Fail(message) => Err(BackendError::Api {
                    status: 500,
                    message,
                }),
                MockBehavior::Delay(duration) => {
                    tokio::time::sleep(duration).await;
                    Ok(BackendJob {
                        job_id: format!("{}-job-{}", self.descriptor.id, seq),
                        status: BackendJobStatus::Completed,
                        result_ref: Some(format!("/results/{}-{}.mp4", self.descriptor.id, seq)),
                        progress: 1.0,
                    })
                }
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }

        async fn get_status(&self, job_id: &str) -> Result<BackendJob, BackendError> {
            Ok(BackendJob {
                job_id: job_id.to_string(),
                status: BackendJobStatus::Completed,
                result_ref: Some(format!("/results/{}.mp4", job_id)),
                progress: 1.0,
            })
        }
    }
}
