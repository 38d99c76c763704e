// Task Notifier Port (notification collaborator)
// Fire-and-forget events on task lifecycle transitions; delivery (email,
// webhook, socket) is an external concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::TaskInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventKind {
    Created,
    Started,
    Progress,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub kind: TaskEventKind,
    pub task: TaskInfo,
}

/// Notification sink for task lifecycle events.
///
/// Implementations must not block task processing; failures are logged by
/// the caller and never propagate into the workflow.
#[async_trait]
pub trait TaskNotifier: Send + Sync {
    async fn notify(&self, event: TaskEvent);
}

/// No-op notifier (default wiring)
pub struct NoopNotifier;

#[async_trait]
impl TaskNotifier for NoopNotifier {
    async fn notify(&self, _event: TaskEvent) {}
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every event for assertions
    #[derive(Default)]
    pub struct RecordingNotifier {
        events: Arc<Mutex<Vec<TaskEvent>>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<TaskEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn kinds_for(&self, task_id: &str) -> Vec<TaskEventKind> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.task.task_id == task_id)
                .map(|e| e.kind)
                .collect()
        }
    }

    #[async_trait]
    impl TaskNotifier for RecordingNotifier {
        async fn notify(&self, event: TaskEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
