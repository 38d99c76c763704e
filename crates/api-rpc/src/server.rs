//! JSON-RPC Server
//!
//! Implements the JSON-RPC 2.0 server over localhost TCP.

use std::path::PathBuf;
use std::sync::Arc;

use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use tracing::info;

use vidra_core::application::protection::ProtectionManager;
use vidra_core::application::resource::ResourceManager;
use vidra_core::application::workflow::WorkflowManager;

use crate::handler::RpcHandler;
use crate::types::{CancelTaskRequest, CreateTaskRequest, RetryTaskRequest, TaskStatusRequest};

// Note: jsonrpsee doesn't support Unix sockets directly (hyper limitation)
// Using TCP on localhost as secure alternative (no external access)
const DEFAULT_SOCKET_PATH: &str = "~/.vidra/vidra.sock";
const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9621;

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub socket_path: PathBuf, // Reserved for future UDS support
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            socket_path: shellexpand::tilde(DEFAULT_SOCKET_PATH).into_owned().into(),
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        workflow: Arc<WorkflowManager>,
        resources: Arc<ResourceManager>,
        protection: Arc<ProtectionManager>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(workflow, resources, protection)),
        }
    }

    /// Start the JSON-RPC server
    ///
    /// Security: only binds to 127.0.0.1 (no external access)
    pub async fn start(self) -> Result<ServerHandle, String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP (localhost only)"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;

        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_async_method("task.create.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: CreateTaskRequest = params.parse()?;
                    handler.create_task(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("task.status.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: TaskStatusRequest = params.parse()?;
                    handler.task_status(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("task.cancel.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: CancelTaskRequest = params.parse()?;
                    handler.cancel_task(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("task.retry.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: RetryTaskRequest = params.parse()?;
                    handler.retry_task(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("task.list.v1", move |_params, _, _| {
                let handler = handler.clone();
                async move { handler.list_tasks().await }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("resource.status.v1", move |_params, _, _| {
                let handler = handler.clone();
                async move { handler.resource_status().await }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("protection.metrics.v1", move |_params, _, _| {
                let handler = handler.clone();
                async move { handler.protection_metrics().await }
            })
            .map_err(|e| e.to_string())?;

        let handle = server.start(module);
        info!("JSON-RPC server started");
        Ok(handle)
    }
}
