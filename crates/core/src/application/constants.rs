// Orchestration constants (no magic values)
use std::time::Duration;

/// Interval of the resource drain loop (queued request processing + expiry)
pub const RESOURCE_DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Interval of the resource utilization monitor loop
pub const RESOURCE_MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// How long a throttled pool stays shrunk before capacity is restored
pub const THROTTLE_COOLDOWN: Duration = Duration::from_secs(30);

/// Memory utilization percentage that triggers throttling
pub const MEMORY_THROTTLE_THRESHOLD: f32 = 85.0;

/// CPU utilization percentage that triggers throttling
pub const CPU_THROTTLE_THRESHOLD: f32 = 80.0;

/// Disk utilization percentage that triggers throttling
pub const DISK_THROTTLE_THRESHOLD: f32 = 90.0;

/// Effective-capacity factor applied to the memory pool under throttling
pub const MEMORY_THROTTLE_FACTOR: f64 = 0.5;

/// Effective-capacity factor applied to the CPU pool under throttling
pub const CPU_THROTTLE_FACTOR: f64 = 0.7;

/// Effective-capacity factor applied to the disk I/O pool under throttling
pub const DISK_THROTTLE_FACTOR: f64 = 0.6;

/// Default timeout for queued resource requests
pub const DEFAULT_RESOURCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default system-wide concurrent task ceiling
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 5;

/// Memory reserved per generation dispatch (MB)
pub const TASK_MEMORY_MB: f64 = 1024.0;

/// Memory reserved per 4K generation dispatch (MB)
pub const TASK_MEMORY_MB_UHD: f64 = 2048.0;

/// Circuit breaker: consecutive failures before opening
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Circuit breaker: successes needed to close from half-open
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;

/// Circuit breaker: time before an open circuit admits a trial call
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Circuit breaker: max trial calls while half-open
pub const DEFAULT_HALF_OPEN_MAX_CALLS: u32 = 3;

/// Circuit breaker: request history ring size per identifier
pub const BREAKER_HISTORY_CAP: usize = 100;

/// Interval of the metrics reporter loop
pub const METRICS_PUSH_INTERVAL: Duration = Duration::from_secs(10);
