// Application Layer - Orchestration services

pub mod cancel;
pub mod constants;
pub mod engine;
pub mod metrics_reporter;
pub mod protection;
pub mod registry;
pub mod resource;
pub mod scheduler;
pub mod shutdown;
pub mod workflow;

// Re-exports
pub use cancel::CancellationFlag;
pub use engine::{GenerationEngine, SelectionStrategy};
pub use metrics_reporter::MetricsReporter;
pub use protection::ProtectionManager;
pub use registry::BackendRegistry;
pub use resource::{ResourceKind, ResourceManager, ResourcePriority};
pub use scheduler::{ScheduledTask, TaskRunner, TaskScheduler};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
pub use workflow::WorkflowManager;
