//! Vidra Generation Engine - Main Entry Point
//! JSON-RPC server + orchestration loops

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vidra_api_rpc::{RpcServer, RpcServerConfig};
use vidra_core::application::constants::DEFAULT_MAX_CONCURRENT_TASKS;
use vidra_core::application::engine::{
    FastestResponse, GenerationEngine, LeastLoaded, Random, RoundRobin, SelectionStrategy,
};
use vidra_core::application::protection::{
    CircuitBreakerConfig, ProtectionManager, RateLimitConfig, RateLimitStrategy,
};
use vidra_core::application::registry::BackendRegistry;
use vidra_core::application::resource::ResourceManager;
use vidra_core::application::shutdown::shutdown_channel;
use vidra_core::application::workflow::WorkflowManager;
use vidra_core::application::MetricsReporter;
use vidra_core::port::id_provider::UuidProvider;
use vidra_core::port::time_provider::SystemTimeProvider;
use vidra_core::port::{MemoryTaskStore, NoopMetricsSink, NoopNotifier, SystemProbe};
use vidra_infra_backends::{load_backends_file, HttpBackend};
use vidra_infra_system::SystemProbeImpl;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn selection_strategy() -> Arc<dyn SelectionStrategy> {
    match std::env::var("VIDRA_SELECTION_STRATEGY").as_deref() {
        Ok("round_robin") => Arc::new(RoundRobin::new()),
        Ok("random") => Arc::new(Random),
        Ok("fastest_response") => Arc::new(FastestResponse),
        _ => Arc::new(LeastLoaded),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format = std::env::var("VIDRA_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("vidra=info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Development: pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Vidra Generation Engine v{} starting...", VERSION);

    // 2. Load configuration
    let rpc_port: u16 = env_parse("VIDRA_RPC_PORT", 9621);
    let max_concurrent: usize =
        env_parse("VIDRA_MAX_CONCURRENT_TASKS", DEFAULT_MAX_CONCURRENT_TASKS);

    // 3. System probe + resource pools sized from probed capacity
    let probe = Arc::new(SystemProbeImpl::new());
    let memory_total_mb = probe.total_memory_mb();
    let cpu_count = probe.cpu_count();
    info!(memory_total_mb, cpu_count, "Sizing resource pools");

    let resources = Arc::new(ResourceManager::with_probed_defaults(
        Arc::clone(&probe) as Arc<dyn SystemProbe>,
        memory_total_mb,
        cpu_count,
    ));

    // 4. Protection manager with boundary admission control
    let protection = Arc::new(ProtectionManager::new());
    protection.register_rate_limiter(
        "operation:create_task",
        RateLimitConfig {
            max_requests: env_parse("VIDRA_CREATE_RATE_LIMIT", 100),
            window: Duration::from_secs(1),
            strategy: RateLimitStrategy::TokenBucket,
            burst_size: Some(env_parse("VIDRA_CREATE_RATE_BURST", 200)),
        },
    )?;

    // 5. Backend registry from the backends file
    let registry = Arc::new(BackendRegistry::new());
    match std::env::var("VIDRA_BACKENDS_FILE") {
        Ok(path) => {
            let endpoints = load_backends_file(&path)?;
            info!(count = endpoints.len(), path = %path, "Registering backends");
            for endpoint in endpoints {
                let name = endpoint.name.clone();
                protection.register_rate_limiter(
                    format!("backend:{}", name),
                    RateLimitConfig {
                        max_requests: 60,
                        window: Duration::from_secs(60),
                        strategy: RateLimitStrategy::SlidingWindow,
                        burst_size: None,
                    },
                )?;
                protection.register_circuit_breaker(
                    format!("backend:{}", name),
                    CircuitBreakerConfig::default(),
                )?;

                let adapter = HttpBackend::new(endpoint)
                    .map_err(|e| anyhow::anyhow!("backend '{}' init failed: {}", name, e))?;
                registry.register(Arc::new(adapter))?;
            }
        }
        Err(_) => {
            warn!("VIDRA_BACKENDS_FILE not set; no backends registered");
        }
    }

    // 6. Engine + workflow wiring (DI)
    let strategy = selection_strategy();
    info!(strategy = strategy.name(), "Load balancing strategy selected");
    let engine = Arc::new(GenerationEngine::new(
        Arc::clone(&registry),
        Arc::clone(&protection),
        Arc::clone(&resources),
        strategy,
    ));

    let workflow = Arc::new(WorkflowManager::new(
        max_concurrent,
        engine,
        Arc::new(MemoryTaskStore::new()),
        Arc::new(NoopNotifier),
        Arc::new(NoopMetricsSink),
        Arc::new(SystemTimeProvider),
        Arc::new(UuidProvider),
    ));

    // 7. Start background loops
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let resource_handle = tokio::spawn(Arc::clone(&resources).run(shutdown_rx.clone()));

    let workflow_loop = Arc::clone(&workflow);
    let workflow_shutdown = shutdown_rx.clone();
    let workflow_handle = tokio::spawn(async move {
        workflow_loop.run(workflow_shutdown).await;
    });

    let reporter = MetricsReporter::new(
        Arc::clone(&resources),
        Arc::clone(&protection),
        Arc::clone(&workflow),
        Arc::new(NoopMetricsSink),
    );
    tokio::spawn(reporter.run(shutdown_rx.clone()));

    // 8. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_config = RpcServerConfig {
        port: rpc_port,
        ..Default::default()
    };
    let rpc_server = RpcServer::new(
        rpc_config,
        Arc::clone(&workflow),
        Arc::clone(&resources),
        Arc::clone(&protection),
    );
    let rpc_handle = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!("System ready. Waiting for tasks...");
    info!("Press Ctrl+C to shutdown");

    // 9. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 10. Graceful shutdown
    shutdown_tx.shutdown();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    let _ = tokio::time::timeout(Duration::from_secs(5), workflow_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), resource_handle).await;

    info!("Shutdown complete.");

    Ok(())
}
