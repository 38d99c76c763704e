// End-to-end orchestration scenarios across the full component stack

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use vidra_core::application::engine::{GenerationEngine, RoundRobin};
use vidra_core::application::protection::{
    CircuitBreakerConfig, ProtectionManager, RateLimitConfig, RateLimitStrategy,
};
use vidra_core::application::registry::BackendRegistry;
use vidra_core::application::resource::{PoolConfig, ResourceKind, ResourceManager};
use vidra_core::application::shutdown::{shutdown_channel, ShutdownSender};
use vidra_core::application::workflow::WorkflowManager;
use vidra_core::domain::{AspectRatio, JobConfig, Quality, TaskPriority, TaskStatus};
use vidra_core::port::backend_adapter::mocks::{MockBackend, MockBehavior};
use vidra_core::port::id_provider::UuidProvider;
use vidra_core::port::notifier::mocks::RecordingNotifier;
use vidra_core::port::system_probe::mocks::MockSystemProbe;
use vidra_core::port::time_provider::SystemTimeProvider;
use vidra_core::port::{MemoryTaskStore, NoopMetricsSink, TaskEventKind, TaskNotifier};

fn resources() -> Arc<ResourceManager> {
    let configs = HashMap::from([
        (
            ResourceKind::Memory,
            PoolConfig {
                total: 32768.0,
                reserved_min: 0.0,
                max_per_request: None,
            },
        ),
        (
            ResourceKind::Connection,
            PoolConfig {
                total: 100.0,
                reserved_min: 0.0,
                max_per_request: None,
            },
        ),
    ]);
    Arc::new(ResourceManager::new(
        Arc::new(MockSystemProbe::new(10.0)),
        configs,
    ))
}

struct Stack {
    workflow: Arc<WorkflowManager>,
    notifier: Arc<RecordingNotifier>,
    protection: Arc<ProtectionManager>,
}

/// Assemble the full stack without starting the dispatch loop, so tests can
/// enqueue a whole batch before the first slot is handed out.
fn build_stack(max_concurrent: usize, backends: Vec<Arc<MockBackend>>) -> Stack {
    let registry = Arc::new(BackendRegistry::new());
    for backend in backends {
        registry.register(backend).unwrap();
    }
    let protection = Arc::new(ProtectionManager::new());
    let engine = Arc::new(GenerationEngine::new(
        registry,
        Arc::clone(&protection),
        resources(),
        Arc::new(RoundRobin::new()),
    ));
    let notifier = Arc::new(RecordingNotifier::new());
    let workflow = Arc::new(WorkflowManager::new(
        max_concurrent,
        engine,
        Arc::new(MemoryTaskStore::new()),
        Arc::clone(&notifier) as Arc<dyn TaskNotifier>,
        Arc::new(NoopMetricsSink),
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
    ));

    Stack {
        workflow,
        notifier,
        protection,
    }
}

fn start_dispatch(stack: &Stack) -> (ShutdownSender, tokio::task::JoinHandle<()>) {
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let workflow_loop = Arc::clone(&stack.workflow);
    let handle = tokio::spawn(async move { workflow_loop.run(shutdown_rx).await });
    (shutdown_tx, handle)
}

fn config() -> JobConfig {
    let mut config =
        JobConfig::new("studio shot", 5.0, Quality::FullHd1080, AspectRatio::Landscape);
    config
        .extra_params
        .insert("watermark".to_string(), serde_json::json!(false));
    config
}

async fn wait_terminal(workflow: &WorkflowManager, task_id: &str) -> TaskStatus {
    for _ in 0..300 {
        if let Some(info) = workflow.get_task_status(task_id) {
            if info.status.is_terminal() {
                return info.status;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} never reached a terminal state", task_id);
}

async fn teardown(shutdown: ShutdownSender, handle: tokio::task::JoinHandle<()>) {
    shutdown.shutdown();
    let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
}

#[tokio::test]
async fn test_priority_dispatch_under_concurrency_cap() {
    // Three backends registered, max_concurrent_tasks = 2
    let backends: Vec<Arc<MockBackend>> = ["luma", "runway", "pika"]
        .iter()
        .map(|id| Arc::new(MockBackend::new(*id, MockBehavior::Delay(Duration::from_millis(80)))))
        .collect();
    let stack = build_stack(2, backends);

    // Submit 5 tasks at priorities [HIGH, LOW, LOW, HIGH, LOW] before the
    // dispatch loop starts
    let priorities = [
        TaskPriority::High,
        TaskPriority::Low,
        TaskPriority::Low,
        TaskPriority::High,
        TaskPriority::Low,
    ];
    let mut ids_by_priority = HashMap::new();
    for priority in priorities {
        let id = stack.workflow.create_task(config(), priority).await.unwrap();
        ids_by_priority.insert(id, priority);
    }

    let (shutdown, handle) = start_dispatch(&stack);
    for id in ids_by_priority.keys() {
        assert_eq!(wait_terminal(&stack.workflow, id).await, TaskStatus::Completed);
    }

    // Reconstruct the dispatch interleaving from lifecycle events
    let events = stack.notifier.events();
    let started_order: Vec<String> = events
        .iter()
        .filter(|e| e.kind == TaskEventKind::Started)
        .map(|e| e.task.task_id.clone())
        .collect();
    assert_eq!(started_order.len(), 5);

    // Both HIGH tasks are dispatched before any LOW task
    assert_eq!(ids_by_priority[&started_order[0]], TaskPriority::High);
    assert_eq!(ids_by_priority[&started_order[1]], TaskPriority::High);

    // Never more than two tasks processing concurrently
    let mut current = 0i32;
    let mut peak = 0i32;
    for event in &events {
        match event.kind {
            TaskEventKind::Started => {
                current += 1;
                peak = peak.max(current);
            }
            TaskEventKind::Completed | TaskEventKind::Failed | TaskEventKind::Cancelled => {
                current -= 1;
            }
            _ => {}
        }
    }
    assert!(peak <= 2, "observed {} concurrent tasks", peak);

    teardown(shutdown, handle).await;
}

#[tokio::test]
async fn test_breaker_opens_after_three_failures_and_blocks_adapter() {
    let backend = Arc::new(MockBackend::new_fail("solo", "backend down"));
    let stack = build_stack(1, vec![Arc::clone(&backend)]);

    stack
        .protection
        .register_circuit_breaker(
            "backend:solo",
            CircuitBreakerConfig {
                failure_threshold: 3,
                recovery_timeout: Duration::from_secs(60),
                ..Default::default()
            },
        )
        .unwrap();

    let (shutdown, handle) = start_dispatch(&stack);

    // Three consecutive failed generations open the breaker
    for _ in 0..3 {
        let id = stack
            .workflow
            .create_task(config(), TaskPriority::Normal)
            .await
            .unwrap();
        assert_eq!(wait_terminal(&stack.workflow, &id).await, TaskStatus::Failed);
    }
    assert_eq!(backend.call_count(), 3);

    // A fourth call within the recovery timeout is rejected without
    // invoking the adapter
    let id = stack
        .workflow
        .create_task(config(), TaskPriority::Normal)
        .await
        .unwrap();
    assert_eq!(wait_terminal(&stack.workflow, &id).await, TaskStatus::Failed);
    assert_eq!(backend.call_count(), 3, "breaker must block the adapter call");

    let info = stack.workflow.get_task_status(&id).unwrap();
    assert!(info
        .error_detail
        .as_deref()
        .unwrap()
        .contains("Circuit breaker"));

    teardown(shutdown, handle).await;
}

#[tokio::test]
async fn test_token_bucket_admits_exactly_burst() {
    let protection = ProtectionManager::new();
    protection
        .register_rate_limiter(
            "backend:metered",
            RateLimitConfig {
                max_requests: 5,
                window: Duration::from_secs(1),
                strategy: RateLimitStrategy::TokenBucket,
                burst_size: Some(5),
            },
        )
        .unwrap();

    // Six instantaneous submissions admit exactly five
    let admitted = (0..6)
        .filter(|_| protection.check_protection("backend:metered").is_ok())
        .count();
    assert_eq!(admitted, 5);
}

#[tokio::test]
async fn test_rate_limited_single_backend_fails_task_with_reason() {
    let backend = Arc::new(MockBackend::new_success("metered"));
    let stack = build_stack(1, vec![Arc::clone(&backend)]);

    stack
        .protection
        .register_rate_limiter(
            "backend:metered",
            RateLimitConfig {
                max_requests: 1,
                window: Duration::from_secs(60),
                strategy: RateLimitStrategy::SlidingWindow,
                burst_size: None,
            },
        )
        .unwrap();

    let (shutdown, handle) = start_dispatch(&stack);

    let first = stack
        .workflow
        .create_task(config(), TaskPriority::Normal)
        .await
        .unwrap();
    assert_eq!(wait_terminal(&stack.workflow, &first).await, TaskStatus::Completed);

    let second = stack
        .workflow
        .create_task(config(), TaskPriority::Normal)
        .await
        .unwrap();
    assert_eq!(wait_terminal(&stack.workflow, &second).await, TaskStatus::Failed);
    assert_eq!(backend.call_count(), 1);

    let info = stack.workflow.get_task_status(&second).unwrap();
    assert!(info.error_detail.as_deref().unwrap().contains("Rate limit"));

    teardown(shutdown, handle).await;
}

#[tokio::test]
async fn test_single_backend_outage_is_transparent_with_fallback() {
    // The failing backend has the higher weight, so it is attempted first;
    // its outage must be invisible to the caller
    let broken = Arc::new(MockBackend::new_fail("broken", "offline").with_weight(100));
    let healthy = Arc::new(MockBackend::new_success("healthy"));
    let stack = build_stack(1, vec![Arc::clone(&broken), Arc::clone(&healthy)]);

    let (shutdown, handle) = start_dispatch(&stack);

    let id = stack
        .workflow
        .create_task(config(), TaskPriority::Normal)
        .await
        .unwrap();
    assert_eq!(wait_terminal(&stack.workflow, &id).await, TaskStatus::Completed);
    assert_eq!(broken.call_count(), 1);
    assert_eq!(healthy.call_count(), 1);

    teardown(shutdown, handle).await;
}

#[tokio::test]
async fn test_no_eligible_backend_fails_task() {
    let stack = build_stack(1, vec![]);
    let (shutdown, handle) = start_dispatch(&stack);

    let id = stack
        .workflow
        .create_task(config(), TaskPriority::Normal)
        .await
        .unwrap();
    assert_eq!(wait_terminal(&stack.workflow, &id).await, TaskStatus::Failed);

    let info = stack.workflow.get_task_status(&id).unwrap();
    assert!(info
        .error_detail
        .as_deref()
        .unwrap()
        .contains("No eligible backend"));

    teardown(shutdown, handle).await;
}
