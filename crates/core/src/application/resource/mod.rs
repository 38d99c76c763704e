// Resource Manager - typed pools with priority admission and throttling

mod pool;

pub use pool::{
    AllocationId, PoolConfig, PoolSnapshot, ResourceKind, ResourcePriority, ResourceSnapshot,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::time::interval;
use tracing::{debug, warn};

use crate::application::constants::{
    CPU_THROTTLE_FACTOR, CPU_THROTTLE_THRESHOLD, DISK_THROTTLE_FACTOR, DISK_THROTTLE_THRESHOLD,
    MEMORY_THROTTLE_FACTOR, MEMORY_THROTTLE_THRESHOLD, RESOURCE_DRAIN_INTERVAL,
    RESOURCE_MONITOR_INTERVAL, THROTTLE_COOLDOWN,
};
use crate::application::shutdown::ShutdownToken;
use crate::error::{AppError, Result};
use crate::port::SystemProbe;

use pool::{Allocation, PendingRequest, PoolState, ThrottleState};

/// One resource acquisition request
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub kind: ResourceKind,
    pub amount: f64,
    pub priority: ResourcePriority,
    pub requester_id: String,
    /// How long the request may wait in the queue
    pub wait_timeout: Duration,
    /// Optional TTL after which a granted allocation is force-released
    pub hold_ttl: Option<Duration>,
}

struct Pool {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

/// Typed resource pools (memory, CPU, disk I/O, network, worker slots,
/// connections) with priority-based admission and throttling.
///
/// Queued requests are drained by a background loop in priority-then-age
/// order; a throttling policy observes system utilization and temporarily
/// shrinks a pool's effective capacity under pressure. At every point in
/// time `allocated <= total - reserved_min` holds per pool.
pub struct ResourceManager {
    pools: HashMap<ResourceKind, Pool>,
    probe: Arc<dyn SystemProbe>,
    seq: AtomicU64,
}

impl ResourceManager {
    pub fn new(probe: Arc<dyn SystemProbe>, configs: HashMap<ResourceKind, PoolConfig>) -> Self {
        let pools = configs
            .into_iter()
            .map(|(kind, config)| {
                (
                    kind,
                    Pool {
                        config,
                        state: Mutex::new(PoolState::new()),
                    },
                )
            })
            .collect();
        Self {
            pools,
            probe,
            seq: AtomicU64::new(1),
        }
    }

    /// Pool sizing derived from probed system capacity: 80% of physical
    /// memory allocatable, fixed envelopes for the I/O-shaped pools.
    pub fn with_probed_defaults(probe: Arc<dyn SystemProbe>, memory_total_mb: u64, cpu_cores: usize) -> Self {
        let memory_total = memory_total_mb as f64 * 0.8;
        let cpu_total = (cpu_cores as f64) * 80.0;
        let worker_slots = (cpu_cores + 4).min(32) as f64;

        let configs = HashMap::from([
            (
                ResourceKind::Memory,
                PoolConfig {
                    total: memory_total,
                    reserved_min: memory_total_mb as f64 * 0.1,
                    max_per_request: Some(memory_total * 0.5),
                },
            ),
            (
                ResourceKind::Cpu,
                PoolConfig {
                    total: cpu_total,
                    reserved_min: cpu_cores as f64 * 10.0,
                    max_per_request: Some(cpu_total * 0.6),
                },
            ),
            (
                ResourceKind::DiskIo,
                PoolConfig {
                    total: 1000.0,
                    reserved_min: 100.0,
                    max_per_request: Some(400.0),
                },
            ),
            (
                ResourceKind::Network,
                PoolConfig {
                    total: 100.0,
                    reserved_min: 10.0,
                    max_per_request: Some(50.0),
                },
            ),
            (
                ResourceKind::WorkerSlot,
                PoolConfig {
                    total: worker_slots,
                    reserved_min: 2.0,
                    max_per_request: Some((worker_slots / 2.0).max(1.0)),
                },
            ),
            (
                ResourceKind::Connection,
                PoolConfig {
                    total: 100.0,
                    reserved_min: 5.0,
                    max_per_request: Some(20.0),
                },
            ),
        ]);
        Self::new(probe, configs)
    }

    fn pool(&self, kind: ResourceKind) -> Result<&Pool> {
        self.pools
            .get(&kind)
            .ok_or_else(|| AppError::Internal(format!("no pool for resource kind {}", kind)))
    }

    fn next_allocation_id(&self, kind: ResourceKind) -> AllocationId {
        format!("alloc-{}-{}", kind, self.seq.fetch_add(1, Ordering::SeqCst))
    }

    /// Immediate allocation attempt; `None` means the pool is currently full.
    pub fn try_allocate(
        &self,
        kind: ResourceKind,
        amount: f64,
        requester_id: &str,
        hold_ttl: Option<Duration>,
    ) -> Result<Option<AllocationId>> {
        let pool = self.pool(kind)?;
        let now = Instant::now();
        let mut state = pool
            .state
            .lock()
            .map_err(|_| AppError::Internal("pool lock poisoned".into()))?;

        if !state.can_allocate(&pool.config, amount, now) {
            return Ok(None);
        }

        let id = self.next_allocation_id(kind);
        state.allocated += amount;
        state.allocations.insert(
            id.clone(),
            Allocation {
                requester_id: requester_id.to_string(),
                amount,
                expires_at: hold_ttl.map(|ttl| now + ttl),
            },
        );
        debug!(allocation = %id, amount, kind = %kind, requester = %requester_id, "Immediate allocation");
        Ok(Some(id))
    }

    /// Acquire resources, waiting in the priority queue if necessary.
    ///
    /// # Errors
    /// - `Validation` if the amount can never be satisfied by this pool
    /// - `ResourceExhausted` if the wait timeout elapses before capacity
    ///   frees up
    pub async fn acquire(&self, request: ResourceRequest) -> Result<AllocationId> {
        let ResourceRequest {
            kind,
            amount,
            priority,
            requester_id,
            wait_timeout,
            hold_ttl,
        } = request;

        if amount <= 0.0 {
            return Err(AppError::Validation(format!(
                "resource amount must be > 0, got {}",
                amount
            )));
        }
        let pool = self.pool(kind)?;
        if amount > pool.config.total - pool.config.reserved_min {
            return Err(AppError::Validation(format!(
                "requested {} of {} exceeds allocatable capacity",
                amount, kind
            )));
        }
        if let Some(cap) = pool.config.max_per_request {
            if amount > cap {
                return Err(AppError::Validation(format!(
                    "requested {} of {} exceeds per-request cap {}",
                    amount, kind, cap
                )));
            }
        }

        if let Some(id) = self.try_allocate(kind, amount, &requester_id, hold_ttl)? {
            return Ok(id);
        }

        // Queue and wait for the drain loop to grant or expire the request
        let (tx, rx) = oneshot::channel();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let now = Instant::now();
        {
            let mut state = pool
                .state
                .lock()
                .map_err(|_| AppError::Internal("pool lock poisoned".into()))?;
            state.pending.push(PendingRequest {
                seq,
                amount,
                priority,
                requester_id: requester_id.clone(),
                enqueued_at: now,
                deadline: now + wait_timeout,
                hold_ttl,
                tx,
            });
        }
        debug!(kind = %kind, amount, requester = %requester_id, "Resource request queued");

        let mut rx = rx;
        let grace = tokio::time::sleep(wait_timeout + RESOURCE_DRAIN_INTERVAL * 2);
        tokio::pin!(grace);

        tokio::select! {
            granted = &mut rx => match granted {
                Ok(result) => result,
                Err(_) => Err(AppError::ResourceExhausted { kind, amount }),
            },
            _ = &mut grace => {
                // Withdraw first; a grant that raced us is then observable
                // on the channel and must not leak
                if let Ok(mut state) = pool.state.lock() {
                    state.pending.retain(|p| p.seq != seq);
                }
                match rx.try_recv() {
                    Ok(result) => result,
                    Err(_) => Err(AppError::ResourceExhausted { kind, amount }),
                }
            }
        }
    }

    /// Free an allocation back to its pool.
    ///
    /// Releasing a non-existent or already-released id is a no-op, not an
    /// error; returns whether anything was freed.
    pub fn release(&self, allocation_id: &str) -> bool {
        for (kind, pool) in &self.pools {
            let Ok(mut state) = pool.state.lock() else { continue };
            if let Some(allocation) = state.allocations.remove(allocation_id) {
                state.allocated -= allocation.amount;
                debug!(allocation = %allocation_id, kind = %kind, amount = allocation.amount, "Released allocation");
                return true;
            }
        }
        false
    }

    /// One pass of the drain loop over a single pool: expire allocations,
    /// expire queued requests, then grant in priority-then-age order.
    fn drain_pool(&self, kind: ResourceKind, pool: &Pool) {
        let now = Instant::now();
        let Ok(mut state) = pool.state.lock() else { return };

        // Expired allocations are force-released
        let expired: Vec<AllocationId> = state
            .allocations
            .iter()
            .filter(|(_, a)| a.expires_at.map(|at| now >= at).unwrap_or(false))
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            if let Some(allocation) = state.allocations.remove(&id) {
                state.allocated -= allocation.amount;
                warn!(allocation = %id, kind = %kind, requester = %allocation.requester_id, "Allocation expired");
            }
        }

        if state.pending.is_empty() {
            return;
        }

        // Priority desc, then age asc, then submission order
        state.pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.enqueued_at.cmp(&b.enqueued_at))
                .then_with(|| a.seq.cmp(&b.seq))
        });

        let mut remaining = Vec::new();
        for request in state.pending.drain(..).collect::<Vec<_>>() {
            if now >= request.deadline {
                let _ = request.tx.send(Err(AppError::ResourceExhausted {
                    kind,
                    amount: request.amount,
                }));
                continue;
            }
            if state.can_allocate(&pool.config, request.amount, now) {
                let id = self.next_allocation_id(kind);
                state.allocated += request.amount;
                state.allocations.insert(
                    id.clone(),
                    Allocation {
                        requester_id: request.requester_id.clone(),
                        amount: request.amount,
                        expires_at: request.hold_ttl.map(|ttl| now + ttl),
                    },
                );
                if request.tx.send(Ok(id.clone())).is_err() {
                    // Requester gave up while we granted; roll back
                    if let Some(allocation) = state.allocations.remove(&id) {
                        state.allocated -= allocation.amount;
                    }
                }
            } else {
                remaining.push(request);
            }
        }
        state.pending = remaining;
    }

    /// Apply throttling: shrink the pool's effective capacity by `factor`
    /// for the cool-down period. Already-granted allocations are untouched.
    fn apply_throttle(&self, kind: ResourceKind, factor: f64) {
        let Some(pool) = self.pools.get(&kind) else { return };
        let Ok(mut state) = pool.state.lock() else { return };
        if state.throttle.is_some() {
            return;
        }
        warn!(kind = %kind, factor, cooldown_secs = THROTTLE_COOLDOWN.as_secs(), "Throttling pool");
        state.throttle = Some(ThrottleState {
            factor,
            until: Instant::now() + THROTTLE_COOLDOWN,
        });
    }

    fn clear_expired_throttles(&self) {
        let now = Instant::now();
        for (kind, pool) in &self.pools {
            let Ok(mut state) = pool.state.lock() else { continue };
            if let Some(throttle) = &state.throttle {
                if now >= throttle.until {
                    debug!(kind = %kind, "Throttle cool-down elapsed, capacity restored");
                    state.throttle = None;
                }
            }
        }
    }

    /// Sample system utilization and throttle pools over their thresholds.
    async fn check_throttling(&self) {
        let metrics = self.probe.get_metrics().await;

        if metrics.memory_percent() > MEMORY_THROTTLE_THRESHOLD {
            self.apply_throttle(ResourceKind::Memory, MEMORY_THROTTLE_FACTOR);
        }
        if metrics.cpu_usage_percent > CPU_THROTTLE_THRESHOLD {
            self.apply_throttle(ResourceKind::Cpu, CPU_THROTTLE_FACTOR);
        }
        if metrics.disk_percent() > DISK_THROTTLE_THRESHOLD {
            self.apply_throttle(ResourceKind::DiskIo, DISK_THROTTLE_FACTOR);
        }
    }

    /// Background loop: drains queued requests on a short fixed interval and
    /// runs the utilization monitor on a longer one. Spawn once at startup.
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownToken) {
        let mut drain_tick = interval(RESOURCE_DRAIN_INTERVAL);
        let mut monitor_tick = interval(RESOURCE_MONITOR_INTERVAL);

        loop {
            tokio::select! {
                _ = drain_tick.tick() => {
                    self.clear_expired_throttles();
                    for (kind, pool) in &self.pools {
                        self.drain_pool(*kind, pool);
                    }
                }
                _ = monitor_tick.tick() => {
                    self.check_throttling().await;
                }
                _ = shutdown.wait() => {
                    debug!("Resource manager loop shutting down");
                    break;
                }
            }
        }
        self.fail_all_pending();
    }

    fn fail_all_pending(&self) {
        for (kind, pool) in &self.pools {
            let Ok(mut state) = pool.state.lock() else { continue };
            for request in state.pending.drain(..) {
                let _ = request.tx.send(Err(AppError::ResourceExhausted {
                    kind: *kind,
                    amount: request.amount,
                }));
            }
        }
    }

    /// Per-pool utilization snapshot
    pub fn snapshot(&self) -> ResourceSnapshot {
        let now = Instant::now();
        let mut pools = Vec::new();
        let mut total_allocations = 0;
        let mut pending_requests = 0;

        for (kind, pool) in &self.pools {
            let Ok(state) = pool.state.lock() else { continue };
            total_allocations += state.allocations.len();
            pending_requests += state.pending.len();
            pools.push(PoolSnapshot {
                kind: *kind,
                total: pool.config.total,
                reserved_min: pool.config.reserved_min,
                allocated: state.allocated,
                available: state.available(&pool.config, now).max(0.0),
                utilization_percent: if pool.config.total > 0.0 {
                    (state.allocated / pool.config.total) * 100.0
                } else {
                    0.0
                },
                active_allocations: state.allocations.len(),
                queued_requests: state.pending.len(),
                throttled: state.throttle.is_some(),
            });
        }
        pools.sort_by_key(|p| format!("{}", p.kind));

        ResourceSnapshot {
            pools,
            total_allocations,
            pending_requests,
        }
    }

    /// Invariant check used by tests: allocated never exceeds
    /// total - reserved_min for any pool.
    pub fn verify_invariants(&self) -> bool {
        self.pools.iter().all(|(_, pool)| {
            pool.state
                .lock()
                .map(|s| s.allocated <= pool.config.total - pool.config.reserved_min + f64::EPSILON)
                .unwrap_or(false)
        })
    }
}
