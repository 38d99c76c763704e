//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method.

use std::sync::Arc;

use jsonrpsee::types::ErrorObjectOwned;
use tracing::debug;

use vidra_core::application::protection::ProtectionManager;
use vidra_core::application::resource::ResourceManager;
use vidra_core::application::workflow::WorkflowManager;
use vidra_core::domain::TaskStatus;
use vidra_core::error::AppError;

use crate::error::to_rpc_error;
use crate::types::{
    CancelTaskRequest, CancelTaskResponse, CreateTaskRequest, CreateTaskResponse,
    ListTasksResponse, ProtectionMetricsResponse, ResourceStatusResponse, RetryTaskRequest,
    RetryTaskResponse, TaskStatusRequest, TaskStatusResponse,
};

/// Identifier gating task submission at the RPC boundary
const CREATE_TASK_IDENTIFIER: &str = "operation:create_task";

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    workflow: Arc<WorkflowManager>,
    resources: Arc<ResourceManager>,
    protection: Arc<ProtectionManager>,
}

impl RpcHandler {
    pub fn new(
        workflow: Arc<WorkflowManager>,
        resources: Arc<ResourceManager>,
        protection: Arc<ProtectionManager>,
    ) -> Self {
        Self {
            workflow,
            resources,
            protection,
        }
    }

    /// task.create.v1
    pub async fn create_task(
        &self,
        params: CreateTaskRequest,
    ) -> Result<CreateTaskResponse, ErrorObjectOwned> {
        // Admission control at the boundary, shared with per-backend gating
        if let Err(denied) = self.protection.check_protection(CREATE_TASK_IDENTIFIER) {
            return Err(to_rpc_error(denied.into()));
        }

        let task_id = self
            .workflow
            .create_task(params.config, params.priority)
            .await
            .map_err(to_rpc_error)?;

        Ok(CreateTaskResponse {
            task_id,
            status: TaskStatus::Pending.to_string(),
        })
    }

    /// task.status.v1
    pub async fn task_status(
        &self,
        params: TaskStatusRequest,
    ) -> Result<TaskStatusResponse, ErrorObjectOwned> {
        let task = self
            .workflow
            .get_task_status(&params.task_id)
            .ok_or_else(|| {
                to_rpc_error(AppError::NotFound(format!(
                    "task {} not found",
                    params.task_id
                )))
            })?;
        Ok(TaskStatusResponse { task })
    }

    /// task.cancel.v1
    pub async fn cancel_task(
        &self,
        params: CancelTaskRequest,
    ) -> Result<CancelTaskResponse, ErrorObjectOwned> {
        let status = self
            .workflow
            .cancel_task(&params.task_id)
            .await
            .map_err(to_rpc_error)?;

        debug!(task_id = %params.task_id, status = %status, "Cancel handled");
        Ok(CancelTaskResponse {
            task_id: params.task_id,
            cancelled: status == TaskStatus::Cancelled,
            status: status.to_string(),
        })
    }

    /// task.retry.v1
    pub async fn retry_task(
        &self,
        params: RetryTaskRequest,
    ) -> Result<RetryTaskResponse, ErrorObjectOwned> {
        let retry_task_id = self
            .workflow
            .retry_task(&params.task_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(RetryTaskResponse {
            task_id: params.task_id,
            retry_task_id,
        })
    }

    /// task.list.v1
    pub async fn list_tasks(&self) -> Result<ListTasksResponse, ErrorObjectOwned> {
        Ok(ListTasksResponse {
            tasks: self.workflow.get_all_tasks(),
            stats: self.workflow.stats(),
        })
    }

    /// resource.status.v1
    pub async fn resource_status(&self) -> Result<ResourceStatusResponse, ErrorObjectOwned> {
        Ok(ResourceStatusResponse {
            resources: self.resources.snapshot(),
        })
    }

    /// protection.metrics.v1
    pub async fn protection_metrics(&self) -> Result<ProtectionMetricsResponse, ErrorObjectOwned> {
        Ok(ProtectionMetricsResponse {
            protection: self.protection.snapshot(),
        })
    }
}
