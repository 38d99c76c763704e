// Metrics Sink Port (metrics collaborator)

use crate::application::resource::ResourceKind;

/// Receives periodic orchestration metrics.
///
/// Implementations aggregate or export; the core only pushes.
pub trait MetricsSink: Send + Sync {
    fn record_pool_utilization(&self, kind: ResourceKind, percent: f64);

    fn record_queue_depth(&self, depth: usize);

    fn record_breaker_state(&self, identifier: &str, state: &str);

    fn record_task_duration(&self, task_id: &str, duration_ms: i64);
}

/// Discards all metrics (default wiring)
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn record_pool_utilization(&self, _kind: ResourceKind, _percent: f64) {}
    fn record_queue_depth(&self, _depth: usize) {}
    fn record_breaker_state(&self, _identifier: &str, _state: &str) {}
    fn record_task_duration(&self, _task_id: &str, _duration_ms: i64) {}
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    pub struct RecordingMetrics {
        pub utilization: Arc<Mutex<Vec<(ResourceKind, f64)>>>,
        pub queue_depths: Arc<Mutex<Vec<usize>>>,
        pub breaker_states: Arc<Mutex<Vec<(String, String)>>>,
        pub task_durations: Arc<Mutex<Vec<(String, i64)>>>,
    }

    impl RecordingMetrics {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl MetricsSink for RecordingMetrics {
        fn record_pool_utilization(&self, kind: ResourceKind, percent: f64) {
            self.utilization.lock().unwrap().push((kind, percent));
        }

        fn record_queue_depth(&self, depth: usize) {
            self.queue_depths.lock().unwrap().push(depth);
        }

        fn record_breaker_state(&self, identifier: &str, state: &str) {
            self.breaker_states
                .lock()
                .unwrap()
                .push((identifier.to_string(), state.to_string()));
        }

        fn record_task_duration(&self, task_id: &str, duration_ms: i64) {
            self.task_durations
                .lock()
                .unwrap()
                .push((task_id.to_string(), duration_ms));
        }
    }
}
