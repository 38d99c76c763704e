// System probe implementation backed by sysinfo

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use sysinfo::{Disks, System};
use tracing::debug;

use vidra_core::port::system_probe::{SystemMetrics, SystemProbe};

/// Cross-platform system probe feeding the resource throttling policy
pub struct SystemProbeImpl {
    system: Arc<Mutex<System>>,
}

impl SystemProbeImpl {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new_all())),
        }
    }

    /// Total physical memory in MB, for sizing the memory pool at startup
    pub fn total_memory_mb(&self) -> u64 {
        let mut sys = match self.system.lock() {
            Ok(s) => s,
            Err(_) => return 0,
        };
        sys.refresh_memory();
        sys.total_memory() / 1024 / 1024
    }

    /// Logical CPU count, for sizing the CPU and worker-slot pools
    pub fn cpu_count(&self) -> usize {
        let sys = match self.system.lock() {
            Ok(s) => s,
            Err(_) => return 1,
        };
        sys.cpus().len().max(1)
    }
}

impl Default for SystemProbeImpl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SystemProbe for SystemProbeImpl {
    async fn get_metrics(&self) -> SystemMetrics {
        let (cpu_usage_percent, memory_used_mb, memory_total_mb) = {
            let mut sys = match self.system.lock() {
                Ok(s) => s,
                Err(_) => {
                    return SystemMetrics {
                        cpu_usage_percent: 0.0,
                        memory_used_mb: 0,
                        memory_total_mb: 0,
                        disk_used_gb: 0,
                        disk_total_gb: 0,
                    }
                }
            };
            sys.refresh_all();
            (
                sys.global_cpu_info().cpu_usage(),
                sys.used_memory() / 1024 / 1024,
                sys.total_memory() / 1024 / 1024,
            )
        };

        // Disk (first disk)
        let disks = Disks::new_with_refreshed_list();
        let (disk_used_gb, disk_total_gb) = if let Some(disk) = disks.first() {
            let total = disk.total_space() / 1024 / 1024 / 1024;
            let available = disk.available_space() / 1024 / 1024 / 1024;
            (total - available, total)
        } else {
            (0, 0)
        };

        debug!(
            cpu = %cpu_usage_percent,
            mem_used_mb = %memory_used_mb,
            mem_total_mb = %memory_total_mb,
            disk_used_gb = %disk_used_gb,
            "System metrics collected"
        );

        SystemMetrics {
            cpu_usage_percent,
            memory_used_mb,
            memory_total_mb,
            disk_used_gb,
            disk_total_gb,
        }
    }
}
