// Resource pool types and per-pool accounting

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::AppError;

/// Types of resources managed by the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Memory,
    Cpu,
    DiskIo,
    Network,
    WorkerSlot,
    Connection,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Memory,
        ResourceKind::Cpu,
        ResourceKind::DiskIo,
        ResourceKind::Network,
        ResourceKind::WorkerSlot,
        ResourceKind::Connection,
    ];
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Memory => write!(f, "memory"),
            ResourceKind::Cpu => write!(f, "cpu"),
            ResourceKind::DiskIo => write!(f, "disk_io"),
            ResourceKind::Network => write!(f, "network"),
            ResourceKind::WorkerSlot => write!(f, "worker_slot"),
            ResourceKind::Connection => write!(f, "connection"),
        }
    }
}

/// Priority levels for resource allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourcePriority {
    Low = 1,
    Normal = 2,
    High = 3,
    Critical = 4,
}

/// Static configuration of one pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub total: f64,
    /// Capacity never handed out to requesters
    pub reserved_min: f64,
    pub max_per_request: Option<f64>,
}

/// Identifier of one granted allocation
pub type AllocationId = String;

#[derive(Debug)]
pub(super) struct Allocation {
    pub requester_id: String,
    pub amount: f64,
    pub expires_at: Option<Instant>,
}

pub(super) struct PendingRequest {
    pub seq: u64,
    pub amount: f64,
    pub priority: ResourcePriority,
    pub requester_id: String,
    pub enqueued_at: Instant,
    pub deadline: Instant,
    pub hold_ttl: Option<std::time::Duration>,
    pub tx: oneshot::Sender<Result<AllocationId, AppError>>,
}

pub(super) struct ThrottleState {
    pub factor: f64,
    pub until: Instant,
}

/// Mutable accounting for one pool, guarded by a per-pool mutex
pub(super) struct PoolState {
    pub allocated: f64,
    pub allocations: HashMap<AllocationId, Allocation>,
    pub pending: Vec<PendingRequest>,
    pub throttle: Option<ThrottleState>,
}

impl PoolState {
    pub fn new() -> Self {
        Self {
            allocated: 0.0,
            allocations: HashMap::new(),
            pending: Vec::new(),
            throttle: None,
        }
    }

    /// Capacity visible to new requests; shrunk while throttled.
    pub fn effective_total(&self, config: &PoolConfig, now: Instant) -> f64 {
        match &self.throttle {
            Some(t) if now < t.until => config.total * t.factor,
            _ => config.total,
        }
    }

    pub fn available(&self, config: &PoolConfig, now: Instant) -> f64 {
        self.effective_total(config, now) - config.reserved_min - self.allocated
    }

    pub fn can_allocate(&self, config: &PoolConfig, amount: f64, now: Instant) -> bool {
        let within_request_cap = config
            .max_per_request
            .map(|cap| amount <= cap)
            .unwrap_or(true);
        within_request_cap && self.available(config, now) >= amount
    }
}

/// Snapshot of one pool, for the status surface
#[derive(Debug, Clone, Serialize)]
pub struct PoolSnapshot {
    pub kind: ResourceKind,
    pub total: f64,
    pub reserved_min: f64,
    pub allocated: f64,
    pub available: f64,
    pub utilization_percent: f64,
    pub active_allocations: usize,
    pub queued_requests: usize,
    pub throttled: bool,
}

/// Per-pool utilization snapshot across all pools
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSnapshot {
    pub pools: Vec<PoolSnapshot>,
    pub total_allocations: usize,
    pub pending_requests: usize,
}
