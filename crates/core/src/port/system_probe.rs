// System resource monitoring port

use async_trait::async_trait;

/// System utilization signals consumed by the resource throttling policy
#[derive(Debug, Clone)]
pub struct SystemMetrics {
    pub cpu_usage_percent: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub disk_used_gb: u64,
    pub disk_total_gb: u64,
}

impl SystemMetrics {
    pub fn memory_percent(&self) -> f32 {
        if self.memory_total_mb == 0 {
            return 0.0;
        }
        (self.memory_used_mb as f32 / self.memory_total_mb as f32) * 100.0
    }

    pub fn disk_percent(&self) -> f32 {
        if self.disk_total_gb == 0 {
            return 0.0;
        }
        (self.disk_used_gb as f32 / self.disk_total_gb as f32) * 100.0
    }
}

/// System probe port for utilization monitoring
///
/// Used for throttling decisions in the resource manager
#[async_trait]
pub trait SystemProbe: Send + Sync {
    /// Get current system metrics
    async fn get_metrics(&self) -> SystemMetrics;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock SystemProbe for testing
    pub struct MockSystemProbe {
        metrics: Arc<Mutex<SystemMetrics>>,
    }

    impl MockSystemProbe {
        pub fn new(cpu_usage_percent: f32) -> Self {
            Self {
                metrics: Arc::new(Mutex::new(SystemMetrics {
                    cpu_usage_percent,
                    memory_used_mb: 1024,
                    memory_total_mb: 8192,
                    disk_used_gb: 100,
                    disk_total_gb: 500,
                })),
            }
        }

        pub fn set_cpu_usage(&self, cpu_usage_percent: f32) {
            self.metrics.lock().unwrap().cpu_usage_percent = cpu_usage_percent;
        }

        pub fn set_memory(&self, used_mb: u64, total_mb: u64) {
            let mut m = self.metrics.lock().unwrap();
            m.memory_used_mb = used_mb;
            m.memory_total_mb = total_mb;
        }
    }

    #[async_trait]
    impl SystemProbe for MockSystemProbe {
        async fn get_metrics(&self) -> SystemMetrics {
            self.metrics.lock().unwrap().clone()
        }
    }
}
