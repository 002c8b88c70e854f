//! Host metrics from sysinfo.
//!
//! Every call is synchronous and infallible from the caller's side: a query
//! that fails yields zeros or a sentinel string.

use std::path::Path;

use sysinfo::{
    CpuRefreshKind, Disks, MemoryRefreshKind, Networks, ProcessRefreshKind, ProcessesToUpdate,
    RefreshKind, System,
};

use super::metrics::{CpuStats, DiskStats, MemoryStats, NetworkCounters, BYTES_PER_GB};
use crate::platform::ram::fetch_ram_speed;

/// Source of host-level readings the collector samples each tick.
pub trait HostMetricsSource: Send {
    fn cpu(&mut self) -> CpuStats;

    fn memory(&mut self) -> MemoryStats;

    /// Usage of the primary system volume.
    fn disk(&mut self) -> DiskStats;

    /// Cumulative counters since boot, not a rate.
    fn network(&mut self) -> NetworkCounters;

    fn process_count(&mut self) -> usize;

    fn uptime_secs(&self) -> u64;

    /// Cached at construction ("3200 MHz", "Unknown" or "N/A").
    fn ram_speed(&self) -> String;
}

/// `used / total * 100`, or 0 for an empty total.
pub fn percent(used: u64, total: u64) -> f64 {
    if total > 0 {
        used as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Platform-conventional system volume: `C:\` when it exists, else `/`.
pub fn default_disk_path() -> String {
    if cfg!(windows) && Path::new("C:\\").exists() {
        "C:\\".to_string()
    } else {
        "/".to_string()
    }
}

pub struct HostMetricsProvider {
    system: System,
    disks: Disks,
    networks: Networks,
    // Cached once: these don't change during a run
    total_memory: u64,
    boot_time: i64,
    disk_path: String,
    ram_speed: String,
}

impl HostMetricsProvider {
    pub fn new() -> Self {
        let refresh_kind = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
            .with_memory(MemoryRefreshKind::everything());

        let system = System::new_with_specifics(refresh_kind);
        let total_memory = system.total_memory();
        let disk_path = default_disk_path();
        let ram_speed = fetch_ram_speed();

        log::debug!(
            "Host provider ready: {} bytes RAM, disk path {}, RAM speed {}",
            total_memory,
            disk_path,
            ram_speed
        );

        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            total_memory,
            boot_time: System::boot_time() as i64,
            disk_path,
            ram_speed,
        }
    }

    pub fn disk_path(&self) -> &str {
        &self.disk_path
    }
}

impl Default for HostMetricsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HostMetricsSource for HostMetricsProvider {
    fn cpu(&mut self) -> CpuStats {
        self.system.refresh_cpu_usage();

        CpuStats {
            total_usage: self.system.global_cpu_usage(),
            per_core: self.system.cpus().iter().map(|cpu| cpu.cpu_usage()).collect(),
        }
    }

    fn memory(&mut self) -> MemoryStats {
        self.system.refresh_memory();

        let used = self.system.used_memory();
        let swap_total = self.system.total_swap();
        let swap_used = self.system.used_swap();

        MemoryStats {
            total_gb: self.total_memory as f64 / BYTES_PER_GB,
            available_gb: self.system.available_memory() as f64 / BYTES_PER_GB,
            used_gb: used as f64 / BYTES_PER_GB,
            percent: percent(used, self.total_memory),
            swap_total_gb: swap_total as f64 / BYTES_PER_GB,
            swap_used_gb: swap_used as f64 / BYTES_PER_GB,
            swap_percent: percent(swap_used, swap_total),
        }
    }

    fn disk(&mut self) -> DiskStats {
        self.disks.refresh(true);

        let Some(disk) = self
            .disks
            .iter()
            .find(|disk| disk.mount_point() == Path::new(&self.disk_path))
        else {
            log::debug!("No mounted volume at {}", self.disk_path);
            return DiskStats::default();
        };

        let total = disk.total_space();
        let used = total.saturating_sub(disk.available_space());

        DiskStats {
            total_gb: total as f64 / BYTES_PER_GB,
            used_gb: used as f64 / BYTES_PER_GB,
            percent: percent(used, total),
        }
    }

    fn network(&mut self) -> NetworkCounters {
        self.networks.refresh(true);

        self.networks
            .values()
            .fold(NetworkCounters::default(), |acc, data| NetworkCounters {
                bytes_sent: acc.bytes_sent.saturating_add(data.total_transmitted()),
                bytes_recv: acc.bytes_recv.saturating_add(data.total_received()),
            })
    }

    fn process_count(&mut self) -> usize {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing(),
        );
        self.system.processes().len()
    }

    fn uptime_secs(&self) -> u64 {
        let now = chrono::Utc::now().timestamp();
        (now - self.boot_time).max(0) as u64
    }

    fn ram_speed(&self) -> String {
        self.ram_speed.clone()
    }
}
