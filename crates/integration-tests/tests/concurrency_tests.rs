// Concurrency and invariant tests for the resource and scheduling layers

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use vidra_core::application::resource::{
    PoolConfig, ResourceKind, ResourceManager, ResourcePriority, ResourceRequest,
};
use vidra_core::application::shutdown::shutdown_channel;
use vidra_core::port::system_probe::mocks::MockSystemProbe;
use vidra_core::port::SystemProbe;
use vidra_infra_system::SystemProbeImpl;

fn small_manager() -> Arc<ResourceManager> {
    let configs = HashMap::from([(
        ResourceKind::WorkerSlot,
        PoolConfig {
            total: 8.0,
            reserved_min: 2.0,
            max_per_request: Some(2.0),
        },
    )]);
    Arc::new(ResourceManager::new(
        Arc::new(MockSystemProbe::new(10.0)),
        configs,
    ))
}

#[tokio::test]
async fn test_pool_invariant_under_concurrent_churn() {
    let manager = small_manager();
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let loop_handle = tokio::spawn(Arc::clone(&manager).run(shutdown_rx));

    // 12 workers repeatedly acquire and release against 6 allocatable slots
    let mut tasks = JoinSet::new();
    for worker in 0..12 {
        let manager = Arc::clone(&manager);
        tasks.spawn(async move {
            let mut granted = 0;
            for round in 0..5 {
                let result = manager
                    .acquire(ResourceRequest {
                        kind: ResourceKind::WorkerSlot,
                        amount: 2.0,
                        priority: ResourcePriority::Normal,
                        requester_id: format!("worker-{}-{}", worker, round),
                        wait_timeout: Duration::from_secs(2),
                        hold_ttl: None,
                    })
                    .await;

                if let Ok(id) = result {
                    granted += 1;
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    assert!(manager.verify_invariants(), "invariant violated while held");
                    manager.release(&id);
                }
            }
            granted
        });
    }

    let mut total_granted = 0;
    while let Some(result) = tasks.join_next().await {
        total_granted += result.unwrap();
    }

    assert!(total_granted > 0, "at least some acquisitions must succeed");
    assert!(manager.verify_invariants());

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.pools[0].allocated, 0.0, "all slots released");
    assert_eq!(snapshot.pending_requests, 0);

    shutdown_tx.shutdown();
    let _ = tokio::time::timeout(Duration::from_secs(1), loop_handle).await;
}

#[tokio::test]
async fn test_releases_wake_queued_requests_in_order() {
    let manager = small_manager();
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let loop_handle = tokio::spawn(Arc::clone(&manager).run(shutdown_rx));

    // Saturate the pool (6 allocatable / 2 per request = 3 holders)
    let mut held = Vec::new();
    for i in 0..3 {
        let id = manager
            .acquire(ResourceRequest {
                kind: ResourceKind::WorkerSlot,
                amount: 2.0,
                priority: ResourcePriority::Normal,
                requester_id: format!("holder-{}", i),
                wait_timeout: Duration::from_secs(2),
                hold_ttl: None,
            })
            .await
            .unwrap();
        held.push(id);
    }

    // A critical-priority waiter queued after a normal one still wins
    let normal_waiter = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .acquire(ResourceRequest {
                    kind: ResourceKind::WorkerSlot,
                    amount: 2.0,
                    priority: ResourcePriority::Normal,
                    requester_id: "waiter-normal".into(),
                    wait_timeout: Duration::from_secs(5),
                    hold_ttl: None,
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let critical_waiter = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .acquire(ResourceRequest {
                    kind: ResourceKind::WorkerSlot,
                    amount: 2.0,
                    priority: ResourcePriority::Critical,
                    requester_id: "waiter-critical".into(),
                    wait_timeout: Duration::from_secs(5),
                    hold_ttl: None,
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    // One slot frees; the drain loop must serve the critical waiter first
    manager.release(&held[0]);
    let critical_result =
        tokio::time::timeout(Duration::from_secs(2), critical_waiter).await;
    assert!(critical_result.unwrap().unwrap().is_ok());

    // The normal waiter is still queued until another release
    manager.release(&held[1]);
    let normal_result = tokio::time::timeout(Duration::from_secs(2), normal_waiter).await;
    assert!(normal_result.unwrap().unwrap().is_ok());

    shutdown_tx.shutdown();
    let _ = tokio::time::timeout(Duration::from_secs(1), loop_handle).await;
}

#[tokio::test]
async fn test_probed_pool_sizing_from_real_system() {
    // The production probe must yield usable sizing inputs on any host
    let probe = Arc::new(SystemProbeImpl::new());
    let memory_total_mb = probe.total_memory_mb();
    let cpu_count = probe.cpu_count();
    assert!(memory_total_mb > 0);
    assert!(cpu_count >= 1);

    let manager = ResourceManager::with_probed_defaults(
        Arc::clone(&probe) as Arc<dyn SystemProbe>,
        memory_total_mb,
        cpu_count,
    );

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.pools.len(), 6);
    for pool in &snapshot.pools {
        assert!(pool.total > 0.0, "{} pool must have capacity", pool.kind);
        assert!(pool.total > pool.reserved_min);
    }
    assert!(manager.verify_invariants());
}
