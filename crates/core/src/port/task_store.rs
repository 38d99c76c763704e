// Task Store Port (persistence collaborator)
// The core keeps an in-memory authoritative copy; durable storage is an
// external concern behind this interface.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::{TaskId, TaskInfo};
use crate::error::Result;

/// Durable store for TaskInfo keyed by task id
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert or update a task record
    async fn save(&self, task: &TaskInfo) -> Result<()>;

    /// Load a task record by id
    async fn load(&self, task_id: &TaskId) -> Result<Option<TaskInfo>>;

    /// Load all task records
    async fn load_all(&self) -> Result<Vec<TaskInfo>>;
}

/// In-memory store (default wiring; also used by tests)
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<HashMap<TaskId, TaskInfo>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn save(&self, task: &TaskInfo) -> Result<()> {
        self.tasks
            .lock()
            .map_err(|_| crate::error::AppError::Internal("task store lock poisoned".into()))?
            .insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn load(&self, task_id: &TaskId) -> Result<Option<TaskInfo>> {
        Ok(self
            .tasks
            .lock()
            .map_err(|_| crate::error::AppError::Internal("task store lock poisoned".into()))?
            .get(task_id)
            .cloned())
    }

    async fn load_all(&self) -> Result<Vec<TaskInfo>> {
        Ok(self
            .tasks
            .lock()
            .map_err(|_| crate::error::AppError::Internal("task store lock poisoned".into()))?
            .values()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let store = MemoryTaskStore::new();
        let task = TaskInfo::new("t-1", 1000);

        store.save(&task).await.unwrap();
        let loaded = store.load(&"t-1".to_string()).await.unwrap().unwrap();
        assert_eq!(loaded.task_id, "t-1");
        assert_eq!(loaded.created_at, 1000);
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let store = MemoryTaskStore::new();
        assert!(store.load(&"nope".to_string()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let store = MemoryTaskStore::new();
        let mut task = TaskInfo::new("t-1", 1000);
        store.save(&task).await.unwrap();

        task.transition(crate::domain::TaskStatus::Processing, 1001)
            .unwrap();
        store.save(&task).await.unwrap();

        let loaded = store.load(&"t-1".to_string()).await.unwrap().unwrap();
        assert_eq!(loaded.status, crate::domain::TaskStatus::Processing);
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }
}
