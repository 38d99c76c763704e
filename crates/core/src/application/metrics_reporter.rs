// Metrics Reporter - periodic push to the metrics collaborator

use std::sync::Arc;

use tokio::time::interval;
use tracing::{debug, info};

use crate::application::constants::METRICS_PUSH_INTERVAL;
use crate::application::protection::ProtectionManager;
use crate::application::resource::ResourceManager;
use crate::application::shutdown::ShutdownToken;
use crate::application::workflow::WorkflowManager;
use crate::port::MetricsSink;

/// Pushes pool utilization, queue depth and breaker states to the metrics
/// sink on a fixed interval. Runs until shutdown.
pub struct MetricsReporter {
    resources: Arc<ResourceManager>,
    protection: Arc<ProtectionManager>,
    workflow: Arc<WorkflowManager>,
    sink: Arc<dyn MetricsSink>,
}

impl MetricsReporter {
    pub fn new(
        resources: Arc<ResourceManager>,
        protection: Arc<ProtectionManager>,
        workflow: Arc<WorkflowManager>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            resources,
            protection,
            workflow,
            sink,
        }
    }

    fn push(&self) {
        let resource_snapshot = self.resources.snapshot();
        for pool in &resource_snapshot.pools {
            self.sink
                .record_pool_utilization(pool.kind, pool.utilization_percent);
        }

        self.sink.record_queue_depth(self.workflow.queue_depth());

        let protection_snapshot = self.protection.snapshot();
        for (identifier, breaker) in &protection_snapshot.circuit_breakers {
            self.sink
                .record_breaker_state(identifier, &breaker.state.to_string());
        }

        debug!(
            pools = resource_snapshot.pools.len(),
            breakers = protection_snapshot.circuit_breakers.len(),
            "Metrics pushed"
        );
    }

    /// Background loop; spawn once at startup.
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = METRICS_PUSH_INTERVAL.as_secs(),
            "Metrics reporter started"
        );
        let mut tick = interval(METRICS_PUSH_INTERVAL);
        loop {
            tokio::select! {
                _ = tick.tick() => self.push(),
                _ = shutdown.wait() => {
                    info!("Metrics reporter shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::engine::{GenerationEngine, RoundRobin};
    use crate::application::protection::CircuitBreakerConfig;
    use crate::application::registry::BackendRegistry;
    use crate::application::resource::{PoolConfig, ResourceKind};
    use crate::port::id_provider::UuidProvider;
    use crate::port::metrics::mocks::RecordingMetrics;
    use crate::port::system_probe::mocks::MockSystemProbe;
    use crate::port::time_provider::SystemTimeProvider;
    use crate::port::{MemoryTaskStore, NoopNotifier};
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_push_covers_all_sections() {
        let probe = Arc::new(MockSystemProbe::new(10.0));
        let resources = Arc::new(ResourceManager::new(
            probe,
            HashMap::from([(
                ResourceKind::Memory,
                PoolConfig {
                    total: 100.0,
                    reserved_min: 0.0,
                    max_per_request: None,
                },
            )]),
        ));
        let protection = Arc::new(ProtectionManager::new());
        protection
            .register_circuit_breaker("backend:luma", CircuitBreakerConfig::default())
            .unwrap();

        let engine = Arc::new(GenerationEngine::new(
            Arc::new(BackendRegistry::new()),
            Arc::clone(&protection),
            Arc::clone(&resources),
            Arc::new(RoundRobin::new()),
        ));
        let workflow = Arc::new(WorkflowManager::new(
            2,
            engine,
            Arc::new(MemoryTaskStore::new()),
            Arc::new(NoopNotifier),
            Arc::new(crate::port::NoopMetricsSink),
            Arc::new(SystemTimeProvider),
            Arc::new(UuidProvider),
        ));

        let sink = Arc::new(RecordingMetrics::new());
        let reporter = MetricsReporter::new(
            resources,
            protection,
            workflow,
            Arc::clone(&sink) as Arc<dyn MetricsSink>,
        );
        reporter.push();

        assert_eq!(sink.utilization.lock().unwrap().len(), 1);
        assert_eq!(sink.queue_depths.lock().unwrap().len(), 1);
        let breakers = sink.breaker_states.lock().unwrap();
        assert_eq!(breakers.len(), 1);
        assert_eq!(breakers[0].0, "backend:luma");
        assert_eq!(breakers[0].1, "closed");
    }
}
