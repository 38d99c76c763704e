// RPC Request/Response DTOs

use serde::{Deserialize, Serialize};

use vidra_core::application::protection::ProtectionSnapshot;
use vidra_core::application::resource::ResourceSnapshot;
use vidra_core::application::workflow::WorkflowStats;
use vidra_core::domain::{JobConfig, TaskInfo, TaskPriority};

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub config: JobConfig,
    #[serde(default)]
    pub priority: TaskPriority,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTaskResponse {
    pub task_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskStatusRequest {
    pub task_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusResponse {
    pub task: TaskInfo,
}

#[derive(Debug, Deserialize)]
pub struct CancelTaskRequest {
    pub task_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelTaskResponse {
    pub task_id: String,
    pub cancelled: bool,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct RetryTaskRequest {
    pub task_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetryTaskResponse {
    pub task_id: String,
    pub retry_task_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListTasksResponse {
    pub tasks: Vec<TaskInfo>,
    pub stats: WorkflowStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceStatusResponse {
    pub resources: ResourceSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProtectionMetricsResponse {
    pub protection: ProtectionSnapshot,
}
