// Workflow Manager - public lifecycle facade for generation tasks

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::application::cancel::CancellationFlag;
use crate::application::engine::GenerationEngine;
use crate::application::scheduler::{ScheduledTask, TaskRunner, TaskScheduler};
use crate::application::shutdown::ShutdownToken;
use crate::domain::{JobConfig, TaskId, TaskInfo, TaskPriority, TaskStatus};
use crate::error::{AppError, Result};
use crate::port::{
    IdProvider, MetricsSink, TaskEvent, TaskEventKind, TaskNotifier, TaskStore, TimeProvider,
};

/// Progress checkpoints of the processing pipeline
const PROGRESS_PREPARING: f32 = 0.05;
const PROGRESS_GENERATING: f32 = 0.25;
const PROGRESS_RENDERING: f32 = 0.9;

struct TaskEntry {
    info: TaskInfo,
    config: JobConfig,
    priority: TaskPriority,
    cancel: CancellationFlag,
}

type SharedEntry = Arc<Mutex<TaskEntry>>;

/// Authoritative task map. The outer lock is held only for lookups and
/// inserts; per-task mutation goes through the entry's own lock so that
/// unrelated tasks never serialize on each other.
#[derive(Default)]
struct TaskTable {
    entries: Mutex<HashMap<TaskId, SharedEntry>>,
}

impl TaskTable {
    fn insert(&self, entry: TaskEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(entry.info.task_id.clone(), Arc::new(Mutex::new(entry)));
        }
    }

    fn get(&self, task_id: &str) -> Option<SharedEntry> {
        self.entries.lock().ok()?.get(task_id).cloned()
    }

    fn all(&self) -> Vec<SharedEntry> {
        self.entries
            .lock()
            .map(|e| e.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct Counters {
    total_created: u64,
    total_completed: u64,
    total_failed: u64,
    total_cancelled: u64,
}

/// Workflow statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStats {
    pub total_created: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_cancelled: u64,
    pub active_tasks: usize,
    pub queued_tasks: usize,
}

/// Public facade and lifecycle owner for generation tasks.
///
/// Coordinates the scheduler, the generation engine, persistence and
/// notification; owns the authoritative TaskInfo map.
pub struct WorkflowManager {
    table: Arc<TaskTable>,
    scheduler: Arc<TaskScheduler>,
    runner: Arc<WorkflowRunner>,
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn TaskNotifier>,
    time_provider: Arc<dyn TimeProvider>,
    id_provider: Arc<dyn IdProvider>,
    counters: Arc<Mutex<Counters>>,
}

impl WorkflowManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        max_concurrent_tasks: usize,
        engine: Arc<GenerationEngine>,
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn TaskNotifier>,
        metrics: Arc<dyn MetricsSink>,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Self {
        let table = Arc::new(TaskTable::default());
        let counters = Arc::new(Mutex::new(Counters::default()));
        let scheduler = Arc::new(TaskScheduler::new(
            max_concurrent_tasks,
            Arc::clone(&time_provider),
        ));
        let runner = Arc::new(WorkflowRunner {
            table: Arc::clone(&table),
            engine,
            store: Arc::clone(&store),
            notifier: Arc::clone(&notifier),
            metrics,
            time_provider: Arc::clone(&time_provider),
            counters: Arc::clone(&counters),
        });
        info!(max_concurrent_tasks, "Workflow manager initialized");
        Self {
            table,
            scheduler,
            runner,
            store,
            notifier,
            time_provider,
            id_provider,
            counters,
        }
    }

    /// Run the dispatch loop until shutdown. Spawn once at startup.
    pub async fn run(&self, shutdown: ShutdownToken) {
        Arc::clone(&self.scheduler)
            .run(self.runner.clone() as Arc<dyn TaskRunner>, shutdown)
            .await;
    }

    /// Create a new generation task.
    ///
    /// Validates the configuration, records the task as PENDING and hands
    /// it to the scheduler.
    ///
    /// # Errors
    /// `AppError::Domain` on invalid configuration (fatal, never retried).
    pub async fn create_task(&self, config: JobConfig, priority: TaskPriority) -> Result<TaskId> {
        config.validate()?;

        let task_id = self.id_provider.generate_id();
        let now = self.time_provider.now_millis();
        let info = TaskInfo::new(task_id.clone(), now);

        self.table.insert(TaskEntry {
            info: info.clone(),
            config: config.clone(),
            priority,
            cancel: CancellationFlag::new(),
        });
        self.store.save(&info).await?;
        self.notifier
            .notify(TaskEvent {
                kind: TaskEventKind::Created,
                task: info,
            })
            .await;

        self.scheduler.enqueue(task_id.clone(), config, priority);
        if let Ok(mut counters) = self.counters.lock() {
            counters.total_created += 1;
        }

        info!(task_id = %task_id, priority = %priority, "Task created");
        Ok(task_id)
    }

    /// Pure read of a task's current state.
    pub fn get_task_status(&self, task_id: &str) -> Option<TaskInfo> {
        let entry = self.table.get(task_id)?;
        let info = entry.lock().ok()?.info.clone();
        Some(info)
    }

    pub fn get_all_tasks(&self) -> Vec<TaskInfo> {
        self.table
            .all()
            .iter()
            .filter_map(|e| e.lock().ok().map(|e| e.info.clone()))
            .collect()
    }

    pub fn get_tasks_by_status(&self, status: TaskStatus) -> Vec<TaskInfo> {
        self.get_all_tasks()
            .into_iter()
            .filter(|t| t.status == status)
            .collect()
    }

    /// Cancel a task. Idempotent: cancelling an already-terminal task is a
    /// no-op returning the existing status.
    ///
    /// A queued task is removed from the scheduler with no side effects; a
    /// dispatched task is signalled to stop at its next suspension point.
    pub async fn cancel_task(&self, task_id: &str) -> Result<TaskStatus> {
        let entry = self
            .table
            .get(task_id)
            .ok_or_else(|| AppError::NotFound(format!("task {} not found", task_id)))?;

        let (status, info_for_save) = {
            let mut entry = entry
                .lock()
                .map_err(|_| AppError::Internal("task entry lock poisoned".into()))?;

            if entry.info.status.is_terminal() {
                return Ok(entry.info.status);
            }

            self.scheduler.cancel_queued(task_id);
            entry.cancel.cancel();

            if entry.info.status.can_transition(TaskStatus::Cancelled) {
                let now = self.time_provider.now_millis();
                entry.info.transition(TaskStatus::Cancelled, now)?;
                (entry.info.status, Some(entry.info.clone()))
            } else {
                // RENDERING cannot be cancelled; report the live status
                (entry.info.status, None)
            }
        };

        if let Some(info) = info_for_save {
            if let Ok(mut counters) = self.counters.lock() {
                counters.total_cancelled += 1;
            }
            if let Err(e) = self.store.save(&info).await {
                error!(task_id = %task_id, error = %e, "Failed to persist cancellation");
            }
            self.notifier
                .notify(TaskEvent {
                    kind: TaskEventKind::Cancelled,
                    task: info,
                })
                .await;
            info!(task_id = %task_id, "Task cancelled");
        }
        Ok(status)
    }

    /// Resubmit a failed task's configuration as a new task.
    ///
    /// Retry is an explicit caller action; the original task keeps its
    /// terminal FAILED state and a fresh task id is returned.
    pub async fn retry_task(&self, task_id: &str) -> Result<TaskId> {
        let entry = self
            .table
            .get(task_id)
            .ok_or_else(|| AppError::NotFound(format!("task {} not found", task_id)))?;

        let (config, priority) = {
            let entry = entry
                .lock()
                .map_err(|_| AppError::Internal("task entry lock poisoned".into()))?;
            if entry.info.status != TaskStatus::Failed {
                return Err(AppError::Conflict(format!(
                    "task {} is {}, only FAILED tasks can be retried",
                    task_id, entry.info.status
                )));
            }
            (entry.config.clone(), entry.priority)
        };

        let new_id = self.create_task(config, priority).await?;
        info!(task_id = %task_id, retry_task_id = %new_id, "Failed task resubmitted");
        Ok(new_id)
    }

    pub fn stats(&self) -> WorkflowStats {
        let counters = self.counters.lock();
        let (created, completed, failed, cancelled) = counters
            .map(|c| {
                (
                    c.total_created,
                    c.total_completed,
                    c.total_failed,
                    c.total_cancelled,
                )
            })
            .unwrap_or((0, 0, 0, 0));
        WorkflowStats {
            total_created: created,
            total_completed: completed,
            total_failed: failed,
            total_cancelled: cancelled,
            active_tasks: self.scheduler.active_count(),
            queued_tasks: self.scheduler.queue_depth(),
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.scheduler.queue_depth()
    }
}

/// Drives one dispatched task through the processing pipeline.
struct WorkflowRunner {
    table: Arc<TaskTable>,
    engine: Arc<GenerationEngine>,
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn TaskNotifier>,
    metrics: Arc<dyn MetricsSink>,
    time_provider: Arc<dyn TimeProvider>,
    counters: Arc<Mutex<Counters>>,
}

impl WorkflowRunner {
    /// Apply a mutation under the entry lock; returns the updated snapshot,
    /// or None if the transition was rejected (e.g. a concurrent cancel won).
    fn update(
        &self,
        entry: &SharedEntry,
        mutate: impl FnOnce(&mut TaskEntry, i64) -> crate::domain::error::Result<()>,
    ) -> Option<TaskInfo> {
        let now = self.time_provider.now_millis();
        let mut entry = entry.lock().ok()?;
        match mutate(&mut entry, now) {
            Ok(()) => Some(entry.info.clone()),
            Err(e) => {
                debug!(task_id = %entry.info.task_id, error = %e, "Transition skipped");
                None
            }
        }
    }

    async fn persist_and_notify(&self, info: TaskInfo, kind: TaskEventKind) {
        if let Err(e) = self.store.save(&info).await {
            error!(task_id = %info.task_id, error = %e, "Failed to persist task state");
        }
        self.notifier.notify(TaskEvent { kind, task: info }).await;
    }
}

#[async_trait]
impl TaskRunner for WorkflowRunner {
    async fn run_task(&self, task: ScheduledTask) {
        let Some(entry) = self.table.get(&task.task_id) else {
            warn!(task_id = %task.task_id, "Dispatched task has no entry, skipping");
            return;
        };

        let cancel = match entry.lock() {
            Ok(e) => {
                if e.info.status.is_terminal() {
                    return;
                }
                e.cancel.clone()
            }
            Err(_) => return,
        };

        // PENDING -> PROCESSING
        let Some(info) = self.update(&entry, |e, now| {
            e.info.transition(TaskStatus::Processing, now)?;
            e.info.set_progress(PROGRESS_PREPARING, now)
        }) else {
            return;
        };
        self.persist_and_notify(info, TaskEventKind::Started).await;

        // PROCESSING -> GENERATING (the engine call is the suspension point)
        if let Some(info) = self.update(&entry, |e, now| {
            e.info.transition(TaskStatus::Generating, now)?;
            e.info.set_progress(PROGRESS_GENERATING, now)
        }) {
            self.persist_and_notify(info, TaskEventKind::Progress).await;
        }

        let started = Instant::now();
        let outcome = self
            .engine
            .generate(&task.task_id, &task.config, task.priority, &cancel)
            .await;
        self.metrics
            .record_task_duration(&task.task_id, started.elapsed().as_millis() as i64);

        match outcome {
            Ok(job) => {
                // GENERATING -> RENDERING -> COMPLETED
                if let Some(info) = self.update(&entry, |e, now| {
                    e.info.transition(TaskStatus::Rendering, now)?;
                    e.info.set_progress(PROGRESS_RENDERING, now)
                }) {
                    self.persist_and_notify(info, TaskEventKind::Progress).await;
                }

                if let Some(info) = self.update(&entry, |e, now| {
                    e.info.result_ref = job.result_ref.clone();
                    e.info.transition(TaskStatus::Completed, now)
                }) {
                    if let Ok(mut counters) = self.counters.lock() {
                        counters.total_completed += 1;
                    }
                    info!(task_id = %info.task_id, result = ?info.result_ref, "Task completed");
                    self.persist_and_notify(info, TaskEventKind::Completed).await;
                }
            }
            Err(AppError::Cancelled) => {
                // cancel_task already recorded the terminal state
                debug!(task_id = %task.task_id, "Task stopped by cancellation");
            }
            Err(e) => {
                if let Some(info) = self.update(&entry, |entry, now| {
                    entry.info.error_detail = Some(e.to_string());
                    entry.info.transition(TaskStatus::Failed, now)
                }) {
                    if let Ok(mut counters) = self.counters.lock() {
                        counters.total_failed += 1;
                    }
                    warn!(task_id = %info.task_id, error = %e, "Task failed");
                    self.persist_and_notify(info, TaskEventKind::Failed).await;
                }
            }
        }
    }
}
