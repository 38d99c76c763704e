// Task Scheduler - global priority queue under a concurrency ceiling

use std::collections::{BinaryHeap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::application::shutdown::ShutdownToken;
use crate::domain::{JobConfig, TaskId, TaskPriority};
use crate::port::TimeProvider;

/// Queue entry wrapping a job awaiting dispatch.
///
/// Ordering key: priority descending, enqueue time ascending (FIFO within a
/// priority band), submission sequence as the final tiebreaker.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub task_id: TaskId,
    pub config: JobConfig,
    pub priority: TaskPriority,
    pub enqueued_at: i64, // epoch ms
    seq: u64,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for ScheduledTask {}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap: greater = dispatched first
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.enqueued_at.cmp(&self.enqueued_at))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Executes one dispatched task to completion.
///
/// Implemented by the workflow manager's runner; the scheduler only cares
/// that the future resolves when the task reaches a terminal state.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_task(&self, task: ScheduledTask);
}

struct SchedulerState {
    queue: BinaryHeap<ScheduledTask>,
    /// Ids currently in the queue; cancellation removes from this set and
    /// the heap entry is skipped on pop
    queued: HashSet<TaskId>,
    active: usize,
    next_seq: u64,
}

/// Holds the global queue of pending jobs and enforces the system-wide
/// concurrency ceiling, dispatching by priority + age.
///
/// Enqueue and dequeue are serialized against `active` mutation, so the
/// ceiling can never be over-admitted.
pub struct TaskScheduler {
    max_concurrent: usize,
    state: Mutex<SchedulerState>,
    wakeup: Notify,
    time_provider: Arc<dyn TimeProvider>,
}

impl TaskScheduler {
    pub fn new(max_concurrent: usize, time_provider: Arc<dyn TimeProvider>) -> Self {
        info!(max_concurrent, "Task scheduler initialized");
        Self {
            max_concurrent,
            state: Mutex::new(SchedulerState {
                queue: BinaryHeap::new(),
                queued: HashSet::new(),
                active: 0,
                next_seq: 1,
            }),
            wakeup: Notify::new(),
            time_provider,
        }
    }

    /// Add a task to the queue; the dispatch loop picks it up when a slot
    /// frees.
    pub fn enqueue(&self, task_id: TaskId, config: JobConfig, priority: TaskPriority) {
        let enqueued_at = self.time_provider.now_millis();
        {
            let Ok(mut state) = self.state.lock() else {
                warn!(task_id = %task_id, "Scheduler lock poisoned, dropping enqueue");
                return;
            };
            let seq = state.next_seq;
            state.next_seq += 1;
            state.queued.insert(task_id.clone());
            state.queue.push(ScheduledTask {
                task_id: task_id.clone(),
                config,
                priority,
                enqueued_at,
                seq,
            });
        }
        debug!(task_id = %task_id, priority = %priority, "Task enqueued");
        self.wakeup.notify_one();
    }

    /// Remove a not-yet-dispatched task from the queue.
    ///
    /// Returns true if the task was still queued (and is now gone with no
    /// side effects); false if it was already dispatched or unknown.
    pub fn cancel_queued(&self, task_id: &str) -> bool {
        let removed = self
            .state
            .lock()
            .map(|mut s| s.queued.remove(task_id))
            .unwrap_or(false);
        if removed {
            debug!(task_id = %task_id, "Queued task cancelled");
        }
        removed
    }

    pub fn queue_depth(&self) -> usize {
        self.state.lock().map(|s| s.queued.len()).unwrap_or(0)
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().map(|s| s.active).unwrap_or(0)
    }

    /// Pop dispatchable tasks while a slot is free, atomically incrementing
    /// the active counter for each.
    fn take_dispatchable(&self) -> Vec<ScheduledTask> {
        let Ok(mut state) = self.state.lock() else { return Vec::new() };
        let mut batch = Vec::new();
        while state.active < self.max_concurrent {
            let Some(task) = state.queue.pop() else { break };
            // Entries cancelled while queued are skipped without a slot
            if !state.queued.remove(&task.task_id) {
                continue;
            }
            state.active += 1;
            batch.push(task);
        }
        batch
    }

    fn release_slot(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.active = state.active.saturating_sub(1);
        }
        self.wakeup.notify_one();
    }

    /// Cooperative dispatch loop. Spawn once; runs until shutdown.
    pub async fn run(self: Arc<Self>, runner: Arc<dyn TaskRunner>, mut shutdown: ShutdownToken) {
        info!("Scheduler dispatch loop started");
        loop {
            if shutdown.is_shutdown() {
                break;
            }

            for task in self.take_dispatchable() {
                let scheduler = Arc::clone(&self);
                let runner = Arc::clone(&runner);
                let task_id = task.task_id.clone();
                debug!(task_id = %task_id, priority = %task.priority, "Dispatching task");
                tokio::spawn(async move {
                    runner.run_task(task).await;
                    scheduler.release_slot();
                });
            }

            tokio::select! {
                _ = self.wakeup.notified() => {}
                _ = shutdown.wait() => {
                    info!("Scheduler dispatch loop shutting down");
                    break;
                }
            }
        }
    }
}
