// Scriptable host and GPU sources shared by the collector tests

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use systemizer::core::gpu::{GpuBackend, GpuProbe};
use systemizer::core::{
    Clock, CollectorConfig, CpuStats, DiskStats, GpuMetricsProvider, GpuStats, GpuVendor,
    HostMetricsSource, MemoryStats, MetricSnapshot, NetworkCounters, StatEnablementRegistry,
    TieredCollector,
};
use systemizer::{Result, SystemizerError};

#[derive(Debug, Clone)]
pub struct HostState {
    pub cpu_usage: f32,
    pub cores: usize,
    pub ram_percent: f64,
    pub net: NetworkCounters,
    pub process_count: usize,
    pub disk_percent: f64,
    pub uptime_secs: u64,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            cpu_usage: 42.0,
            cores: 8,
            ram_percent: 55.0,
            net: NetworkCounters {
                bytes_sent: 1_000_000,
                bytes_recv: 1_000_000,
            },
            process_count: 200,
            disk_percent: 71.0,
            uptime_secs: 7_500,
        }
    }
}

pub struct ScriptedHost {
    pub state: Arc<Mutex<HostState>>,
}

impl HostMetricsSource for ScriptedHost {
    fn cpu(&mut self) -> CpuStats {
        let state = self.state.lock();
        CpuStats {
            total_usage: state.cpu_usage,
            per_core: vec![state.cpu_usage; state.cores],
        }
    }

    fn memory(&mut self) -> MemoryStats {
        let state = self.state.lock();
        MemoryStats {
            total_gb: 32.0,
            used_gb: 32.0 * state.ram_percent / 100.0,
            percent: state.ram_percent,
            ..Default::default()
        }
    }

    fn disk(&mut self) -> DiskStats {
        DiskStats {
            total_gb: 512.0,
            used_gb: 0.0,
            percent: self.state.lock().disk_percent,
        }
    }

    fn network(&mut self) -> NetworkCounters {
        self.state.lock().net
    }

    fn process_count(&mut self) -> usize {
        self.state.lock().process_count
    }

    fn uptime_secs(&self) -> u64 {
        self.state.lock().uptime_secs
    }

    fn ram_speed(&self) -> String {
        "3200 MHz".to_string()
    }
}

#[derive(Debug, Clone)]
pub struct GpuState {
    /// `None` makes adapter enumeration fail.
    pub adapter: Option<String>,
    pub vendor_library: bool,
    pub generic_counters: bool,
    pub fail_stats: bool,
    pub usage: f64,
}

impl GpuState {
    pub fn nvidia() -> Self {
        Self {
            adapter: Some("NVIDIA GeForce RTX 4070".to_string()),
            vendor_library: true,
            generic_counters: true,
            fail_stats: false,
            usage: 35.0,
        }
    }

    pub fn absent() -> Self {
        Self {
            adapter: None,
            vendor_library: false,
            generic_counters: false,
            fail_stats: false,
            usage: 0.0,
        }
    }
}

pub struct ScriptedProbe {
    pub state: Arc<Mutex<GpuState>>,
}

struct ScriptedBackend {
    vendor: GpuVendor,
    name: String,
    state: Arc<Mutex<GpuState>>,
}

impl GpuBackend for ScriptedBackend {
    fn vendor(&self) -> GpuVendor {
        self.vendor
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn vram_total_mb(&self) -> f64 {
        12_288.0
    }

    fn collect_stats(&mut self) -> Result<GpuStats> {
        let state = self.state.lock();
        if state.fail_stats {
            return Err(SystemizerError::metric_collection("device lost"));
        }
        Ok(GpuStats {
            gpu_usage: state.usage,
            vram_used_mb: 3_072.0,
            vram_total_mb: 12_288.0,
            temperature_celsius: 61.0,
            power_draw_watts: 120.0,
            fan_speed_percent: 40.0,
            core_clock_mhz: 2_475.0,
            ..Default::default()
        })
    }
}

impl GpuProbe for ScriptedProbe {
    fn adapter_name(&self) -> Result<String> {
        self.state
            .lock()
            .adapter
            .clone()
            .ok_or_else(|| SystemizerError::gpu_not_available("no display adapter"))
    }

    fn init_vendor(&self, vendor: GpuVendor) -> Result<Box<dyn GpuBackend>> {
        let state = self.state.lock();
        match (&state.adapter, state.vendor_library) {
            (Some(name), true) => Ok(Box::new(ScriptedBackend {
                vendor,
                name: name.clone(),
                state: Arc::clone(&self.state),
            })),
            _ => Err(SystemizerError::nvidia_library("library not loaded")),
        }
    }

    fn init_generic(&self) -> Result<Box<dyn GpuBackend>> {
        let state = self.state.lock();
        match (&state.adapter, state.generic_counters) {
            (Some(name), true) => Ok(Box::new(ScriptedBackend {
                vendor: GpuVendor::Generic,
                name: name.clone(),
                state: Arc::clone(&self.state),
            })),
            _ => Err(SystemizerError::gpu_not_available("no counters")),
        }
    }
}

/// Clock that only moves when a test advances it.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

pub struct Harness {
    pub collector: TieredCollector,
    pub clock: ManualClock,
    pub host: Arc<Mutex<HostState>>,
    pub gpu: Arc<Mutex<GpuState>>,
}

pub fn harness(gpu: GpuState) -> Harness {
    harness_with(gpu, CollectorConfig {
        channel_capacity: 1024,
        ..Default::default()
    })
}

pub fn harness_with(gpu: GpuState, config: CollectorConfig) -> Harness {
    let host = Arc::new(Mutex::new(HostState::default()));
    let gpu = Arc::new(Mutex::new(gpu));
    let clock = ManualClock::new();

    let collector = TieredCollector::with_sources(
        Box::new(ScriptedHost {
            state: Arc::clone(&host),
        }),
        GpuMetricsProvider::new(Box::new(ScriptedProbe {
            state: Arc::clone(&gpu),
        })),
        Arc::new(StatEnablementRegistry::new()),
        config,
    )
    .with_clock(Box::new(clock.clone()));

    Harness {
        collector,
        clock,
        host,
        gpu,
    }
}

pub fn drain(rx: &mut broadcast::Receiver<MetricSnapshot>) -> Vec<MetricSnapshot> {
    let mut out = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        out.push(snapshot);
    }
    out
}
