// Load-balancing strategies for ordering candidate backends

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::domain::BackendId;
use crate::port::BackendAdapter;

/// Runtime performance tracking for one backend
#[derive(Debug, Clone, Default)]
pub struct BackendStats {
    pub total_requests: u64,
    pub failed_requests: u64,
    /// Exponentially weighted moving average of call latency
    pub avg_response_ms: f64,
    pub current_load: u32,
}

impl BackendStats {
    pub fn record_success(&mut self, response_ms: f64) {
        self.total_requests += 1;
        if self.avg_response_ms == 0.0 {
            self.avg_response_ms = response_ms;
        } else {
            self.avg_response_ms = self.avg_response_ms * 0.8 + response_ms * 0.2;
        }
    }

    pub fn record_failure(&mut self) {
        self.total_requests += 1;
        self.failed_requests += 1;
    }

    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.failed_requests as f64 / self.total_requests as f64
    }
}

/// Load-balancing policy applied to the registry's candidate list.
///
/// Strategies reorder candidates without otherwise changing the engine's
/// control flow; the engine walks the result in order with fallback.
pub trait SelectionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn order(
        &self,
        candidates: &mut Vec<Arc<dyn BackendAdapter>>,
        stats: &HashMap<BackendId, BackendStats>,
    );
}

/// Rotates the starting candidate across calls
#[derive(Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStrategy for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn order(
        &self,
        candidates: &mut Vec<Arc<dyn BackendAdapter>>,
        _stats: &HashMap<BackendId, BackendStats>,
    ) {
        if candidates.len() > 1 {
            let offset = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
            candidates.rotate_left(offset);
        }
    }
}

/// Shuffles candidates uniformly
pub struct Random;

impl SelectionStrategy for Random {
    fn name(&self) -> &'static str {
        "random"
    }

    fn order(
        &self,
        candidates: &mut Vec<Arc<dyn BackendAdapter>>,
        _stats: &HashMap<BackendId, BackendStats>,
    ) {
        candidates.shuffle(&mut rand::thread_rng());
    }
}

/// Prefers backends with the fewest in-flight calls
pub struct LeastLoaded;

impl SelectionStrategy for LeastLoaded {
    fn name(&self) -> &'static str {
        "least_loaded"
    }

    fn order(
        &self,
        candidates: &mut Vec<Arc<dyn BackendAdapter>>,
        stats: &HashMap<BackendId, BackendStats>,
    ) {
        candidates.sort_by_key(|adapter| {
            stats
                .get(&adapter.descriptor().id)
                .map(|s| s.current_load)
                .unwrap_or(0)
        });
    }
}

/// Prefers backends with the lowest observed average latency; backends with
/// no history yet sort first so they get probed.
pub struct FastestResponse;

impl SelectionStrategy for FastestResponse {
    fn name(&self) -> &'static str {
        "fastest_response"
    }

    fn order(
        &self,
        candidates: &mut Vec<Arc<dyn BackendAdapter>>,
        stats: &HashMap<BackendId, BackendStats>,
    ) {
        candidates.sort_by(|a, b| {
            let avg = |adapter: &Arc<dyn BackendAdapter>| {
                stats
                    .get(&adapter.descriptor().id)
                    .map(|s| s.avg_response_ms)
                    .unwrap_or(0.0)
            };
            avg(a).partial_cmp(&avg(b)).unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}
