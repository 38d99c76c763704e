// Generation Engine - backend selection, protection gating, dispatch

pub mod selection;

pub use selection::{
    BackendStats, FastestResponse, LeastLoaded, Random, RoundRobin, SelectionStrategy,
};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::application::cancel::CancellationFlag;
use crate::application::constants::{
    DEFAULT_RESOURCE_TIMEOUT, TASK_MEMORY_MB, TASK_MEMORY_MB_UHD,
};
use crate::application::protection::ProtectionManager;
use crate::application::registry::BackendRegistry;
use crate::application::resource::{
    ResourceKind, ResourceManager, ResourcePriority, ResourceRequest,
};
use crate::domain::{BackendId, JobConfig, Quality, TaskPriority};
use crate::error::{AppError, AttemptFailure, Result};
use crate::port::{BackendAdapter, BackendJob, BackendJobStatus};

#[derive(Default)]
struct EngineTotals {
    total_generations: u64,
    successful_generations: u64,
}

/// Engine statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub total_generations: u64,
    pub successful_generations: u64,
    pub success_rate: f64,
    pub strategy: &'static str,
}

/// Orchestrates one generation dispatch: candidate lookup, load-balancing
/// order, protection gating, resource reservation, and exhaustive fallback
/// across candidates.
///
/// A single backend's outage is transparent to the caller whenever any
/// other eligible backend exists.
pub struct GenerationEngine {
    registry: Arc<BackendRegistry>,
    protection: Arc<ProtectionManager>,
    resources: Arc<ResourceManager>,
    strategy: Arc<dyn SelectionStrategy>,
    stats: Mutex<HashMap<BackendId, BackendStats>>,
    totals: Mutex<EngineTotals>,
    resource_wait: Duration,
}

impl GenerationEngine {
    pub fn new(
        registry: Arc<BackendRegistry>,
        protection: Arc<ProtectionManager>,
        resources: Arc<ResourceManager>,
        strategy: Arc<dyn SelectionStrategy>,
    ) -> Self {
        Self {
            registry,
            protection,
            resources,
            strategy,
            stats: Mutex::new(HashMap::new()),
            totals: Mutex::new(EngineTotals::default()),
            resource_wait: DEFAULT_RESOURCE_TIMEOUT,
        }
    }

    pub fn with_resource_timeout(mut self, wait: Duration) -> Self {
        self.resource_wait = wait;
        self
    }

    fn memory_for(quality: Quality) -> f64 {
        match quality {
            Quality::Uhd4k => TASK_MEMORY_MB_UHD,
            _ => TASK_MEMORY_MB,
        }
    }

    fn resource_priority(priority: TaskPriority) -> ResourcePriority {
        match priority {
            TaskPriority::Low => ResourcePriority::Low,
            TaskPriority::Normal => ResourcePriority::Normal,
            TaskPriority::High => ResourcePriority::High,
            TaskPriority::Urgent => ResourcePriority::Critical,
        }
    }

    /// Execute a generation job against the best available backend.
    ///
    /// Resource reservation runs before protection checks; resource
    /// exhaustion is scarcer and cheaper to detect. Both reservations are
    /// released on every exit path.
    pub async fn generate(
        &self,
        task_id: &str,
        config: &JobConfig,
        priority: TaskPriority,
        cancel: &CancellationFlag,
    ) -> Result<BackendJob> {
        let candidates = self.registry.find(config);
        if candidates.is_empty() {
            warn!(task_id = %task_id, "No eligible backend for configuration");
            return Err(AppError::NoEligibleBackend);
        }

        let memory = self
            .resources
            .acquire(ResourceRequest {
                kind: ResourceKind::Memory,
                amount: Self::memory_for(config.quality),
                priority: Self::resource_priority(priority),
                requester_id: task_id.to_string(),
                wait_timeout: self.resource_wait,
                hold_ttl: None,
            })
            .await?;

        let connection = match self
            .resources
            .acquire(ResourceRequest {
                kind: ResourceKind::Connection,
                amount: 1.0,
                priority: Self::resource_priority(priority),
                requester_id: task_id.to_string(),
                wait_timeout: self.resource_wait,
                hold_ttl: None,
            })
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.resources.release(&memory);
                return Err(e);
            }
        };

        let result = self.dispatch(task_id, config, candidates, cancel).await;

        self.resources.release(&connection);
        self.resources.release(&memory);

        {
            let mut totals = self
                .totals
                .lock()
                .map_err(|_| AppError::Internal("engine totals lock poisoned".into()))?;
            totals.total_generations += 1;
            if result.is_ok() {
                totals.successful_generations += 1;
            }
        }
        result
    }

    /// Walk candidates in strategy order with exhaustive fallback.
    async fn dispatch(
        &self,
        task_id: &str,
        config: &JobConfig,
        mut candidates: Vec<Arc<dyn BackendAdapter>>,
        cancel: &CancellationFlag,
    ) -> Result<BackendJob> {
        {
            let stats = self
                .stats
                .lock()
                .map_err(|_| AppError::Internal("engine stats lock poisoned".into()))?;
            self.strategy.order(&mut candidates, &stats);
        }

        let mut attempts: Vec<AttemptFailure> = Vec::new();

        for adapter in candidates {
            if cancel.is_cancelled() {
                info!(task_id = %task_id, "Generation cancelled between candidate attempts");
                return Err(AppError::Cancelled);
            }

            let backend_id = adapter.descriptor().id;
            let identifier = format!("backend:{}", backend_id);

            if let Err(denied) = self.protection.check_protection(&identifier) {
                debug!(task_id = %task_id, backend = %backend_id, reason = %denied, "Candidate rejected by protection, falling back");
                attempts.push(AttemptFailure {
                    backend: backend_id,
                    reason: denied.to_string(),
                });
                continue;
            }

            self.set_load(&backend_id, 1);
            let started = Instant::now();
            // The adapter call is the single suspension point of the engine
            let outcome = adapter.generate(config).await;
            let elapsed_ms = started.elapsed().as_millis() as i64;
            self.set_load(&backend_id, -1);

            match outcome {
                Ok(job) if job.status != BackendJobStatus::Failed => {
                    self.protection.record_success(&identifier, elapsed_ms);
                    self.record_success(&backend_id, elapsed_ms as f64);
                    info!(
                        task_id = %task_id,
                        backend = %backend_id,
                        job_id = %job.job_id,
                        elapsed_ms,
                        "Generation dispatched successfully"
                    );
                    return Ok(job);
                }
                Ok(job) => {
                    let reason = format!("backend reported failed job {}", job.job_id);
                    self.protection.record_failure(&identifier, elapsed_ms);
                    self.record_failure(&backend_id);
                    warn!(task_id = %task_id, backend = %backend_id, %reason, "Candidate failed, falling back");
                    attempts.push(AttemptFailure {
                        backend: backend_id,
                        reason,
                    });
                }
                Err(e) => {
                    self.protection.record_failure(&identifier, elapsed_ms);
                    self.record_failure(&backend_id);
                    warn!(task_id = %task_id, backend = %backend_id, error = %e, "Candidate failed, falling back");
                    attempts.push(AttemptFailure {
                        backend: backend_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(AppError::AllBackendsFailed { attempts })
    }

    fn set_load(&self, backend_id: &str, delta: i32) {
        if let Ok(mut stats) = self.stats.lock() {
            let entry = stats.entry(backend_id.to_string()).or_default();
            if delta > 0 {
                entry.current_load += delta as u32;
            } else {
                entry.current_load = entry.current_load.saturating_sub((-delta) as u32);
            }
        }
    }

    fn record_success(&self, backend_id: &str, response_ms: f64) {
        if let Ok(mut stats) = self.stats.lock() {
            stats
                .entry(backend_id.to_string())
                .or_default()
                .record_success(response_ms);
        }
    }

    fn record_failure(&self, backend_id: &str) {
        if let Ok(mut stats) = self.stats.lock() {
            stats.entry(backend_id.to_string()).or_default().record_failure();
        }
    }

    pub fn backend_stats(&self) -> HashMap<BackendId, BackendStats> {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn engine_stats(&self) -> EngineStats {
        let totals = self.totals.lock();
        let (total, successful) = totals
            .map(|t| (t.total_generations, t.successful_generations))
            .unwrap_or((0, 0));
        EngineStats {
            total_generations: total,
            successful_generations: successful,
            success_rate: if total > 0 {
                successful as f64 / total as f64
            } else {
                0.0
            },
            strategy: self.strategy.name(),
        }
    }
}
