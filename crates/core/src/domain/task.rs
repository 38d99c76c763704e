// Task Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};

/// Task ID (UUID v4, generated at creation)
pub type TaskId = String;

/// Task lifecycle state machine.
///
/// Transitions are monotonic: no state is re-entered, and the terminal
/// states (COMPLETED/FAILED/CANCELLED) are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Processing,
    Generating,
    Rendering,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Position in the forward pipeline; terminal states have no rank.
    fn rank(&self) -> Option<u8> {
        match self {
            TaskStatus::Pending => Some(0),
            TaskStatus::Processing => Some(1),
            TaskStatus::Generating => Some(2),
            TaskStatus::Rendering => Some(3),
            _ => None,
        }
    }

    /// Whether `self -> to` is a legal transition.
    pub fn can_transition(&self, to: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            TaskStatus::Completed => *self == TaskStatus::Rendering,
            TaskStatus::Failed => matches!(
                self,
                TaskStatus::Processing | TaskStatus::Generating | TaskStatus::Rendering
            ),
            TaskStatus::Cancelled => matches!(
                self,
                TaskStatus::Pending | TaskStatus::Processing | TaskStatus::Generating
            ),
            _ => match (self.rank(), to.rank()) {
                // Forward one step only: PENDING -> PROCESSING -> GENERATING -> RENDERING
                (Some(from), Some(to)) => to == from + 1,
                _ => false,
            },
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::Processing => write!(f, "PROCESSING"),
            TaskStatus::Generating => write!(f, "GENERATING"),
            TaskStatus::Rendering => write!(f, "RENDERING"),
            TaskStatus::Completed => write!(f, "COMPLETED"),
            TaskStatus::Failed => write!(f, "FAILED"),
            TaskStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Task priority (higher value dispatches first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low = 1,
    Normal = 2,
    High = 3,
    Urgent = 4,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Normal
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "LOW"),
            TaskPriority::Normal => write!(f, "NORMAL"),
            TaskPriority::High => write!(f, "HIGH"),
            TaskPriority::Urgent => write!(f, "URGENT"),
        }
    }
}

/// Mutable task record owned by the workflow manager.
///
/// Exactly one TaskInfo exists per task id; all updates go through the
/// guarded methods below with an explicit `now_millis` (injected, never
/// system time - see TimeProvider).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_id: TaskId,
    pub status: TaskStatus,
    /// Progress in [0, 1]
    pub progress: f32,
    pub created_at: i64, // epoch ms
    pub updated_at: i64,
    pub result_ref: Option<String>,
    pub error_detail: Option<String>,
}

impl TaskInfo {
    pub fn new(task_id: impl Into<String>, created_at: i64) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Pending,
            progress: 0.0,
            created_at,
            updated_at: created_at,
            result_ref: None,
            error_detail: None,
        }
    }

    /// Transition to a new status, enforcing the monotonic state machine.
    pub fn transition(&mut self, to: TaskStatus, now_millis: i64) -> Result<()> {
        if !self.status.can_transition(to) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        self.updated_at = now_millis;
        if to == TaskStatus::Completed {
            self.progress = 1.0;
        }
        Ok(())
    }

    /// Update progress within the current (non-terminal) state.
    pub fn set_progress(&mut self, progress: f32, now_millis: i64) -> Result<()> {
        if !(0.0..=1.0).contains(&progress) {
            return Err(DomainError::InvalidProgress(progress));
        }
        if self.status.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: self.status.to_string(),
            });
        }
        self.progress = progress;
        self.updated_at = now_millis;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_pipeline() {
        let mut task = TaskInfo::new("t-1", 1000);
        task.transition(TaskStatus::Processing, 1001).unwrap();
        task.transition(TaskStatus::Generating, 1002).unwrap();
        task.transition(TaskStatus::Rendering, 1003).unwrap();
        task.transition(TaskStatus::Completed, 1004).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 1.0);
        assert_eq!(task.updated_at, 1004);
    }

    #[test]
    fn test_no_state_skipping() {
        let mut task = TaskInfo::new("t-2", 1000);
        assert!(task.transition(TaskStatus::Generating, 1001).is_err());
        assert!(task.transition(TaskStatus::Completed, 1001).is_err());
    }

    #[test]
    fn test_terminal_states_absorbing() {
        let mut task = TaskInfo::new("t-3", 1000);
        task.transition(TaskStatus::Cancelled, 1001).unwrap();
        assert!(task.transition(TaskStatus::Processing, 1002).is_err());
        assert!(task.transition(TaskStatus::Failed, 1002).is_err());
        assert!(task.set_progress(0.5, 1002).is_err());
    }

    #[test]
    fn test_cancel_allowed_until_rendering() {
        let mut task = TaskInfo::new("t-4", 1000);
        task.transition(TaskStatus::Processing, 1001).unwrap();
        task.transition(TaskStatus::Generating, 1002).unwrap();
        assert!(task.status.can_transition(TaskStatus::Cancelled));

        task.transition(TaskStatus::Rendering, 1003).unwrap();
        assert!(!task.status.can_transition(TaskStatus::Cancelled));
        assert!(task.status.can_transition(TaskStatus::Failed));
    }

    #[test]
    fn test_pending_cannot_fail_directly() {
        let task = TaskInfo::new("t-5", 1000);
        assert!(!task.status.can_transition(TaskStatus::Failed));
    }

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Urgent > TaskPriority::High);
        assert!(TaskPriority::High > TaskPriority::Normal);
        assert!(TaskPriority::Normal > TaskPriority::Low);
    }

    #[test]
    fn test_progress_bounds() {
        let mut task = TaskInfo::new("t-6", 1000);
        task.transition(TaskStatus::Processing, 1001).unwrap();
        assert!(task.set_progress(1.5, 1002).is_err());
        assert!(task.set_progress(0.4, 1002).is_ok());
        assert_eq!(task.progress, 0.4);
    }
}
