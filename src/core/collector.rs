//! Tiered background collector.
//!
//! One worker thread samples the host and GPU providers once per period and
//! publishes four independent snapshot streams:
//!
//! | tier   | cadence                                  | keys                         |
//! |--------|------------------------------------------|------------------------------|
//! | fast   | every tick                               | CPU, RAM, network throughput |
//! | medium | `tick % medium_every == 0`               | process count                |
//! | slow   | `tick % slow_every == 0`                 | disk, uptime                 |
//! | gpu    | every tick while available, else re-probe every `gpu_reprobe_every` ticks | GPU |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::gpu::GpuMetricsProvider;
use super::host::{HostMetricsProvider, HostMetricsSource};
use super::metrics::{GpuInfo, MetricKey, MetricSnapshot, MetricValue, NetworkCounters, Tier};
use super::registry::{EnabledSet, StatEnablementRegistry};
use crate::error::{Result, SystemizerError};

/// Configuration for the sampling loop
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Nominal length of one tick.
    pub period: Duration,
    pub medium_every: u64,
    pub slow_every: u64,
    /// How often an unavailable GPU is looked for again.
    pub gpu_reprobe_every: u64,
    /// Per-tier broadcast buffer; slower subscribers lose the oldest snapshots.
    pub channel_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            medium_every: 5,
            slow_every: 30,
            gpu_reprobe_every: 300,
            channel_capacity: 64,
        }
    }
}

/// Whether a tier with cadence `every` fires on `tick`. Tick 0 fires every tier.
pub fn tier_fires(tick: u64, every: u64) -> bool {
    every > 0 && tick % every == 0
}

/// Byte-counter delta over `elapsed`, in KB/s. Counter resets read as zero.
pub fn throughput_kbps(previous: u64, current: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    current.saturating_sub(previous) as f64 / 1024.0 / secs
}

/// Whole hours and the leftover whole minutes.
pub fn split_uptime(secs: u64) -> (u64, u64) {
    (secs / 3600, (secs % 3600) / 60)
}

/// Time source for rate measurements.
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    /// Constructed, worker not spawned yet.
    Idle,
    Running,
    /// Terminal. Build a new collector to resume.
    Stopped,
}

#[derive(Clone)]
struct TierChannels {
    fast: broadcast::Sender<MetricSnapshot>,
    medium: broadcast::Sender<MetricSnapshot>,
    slow: broadcast::Sender<MetricSnapshot>,
    gpu: broadcast::Sender<MetricSnapshot>,
}

impl TierChannels {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            fast: broadcast::channel(capacity).0,
            medium: broadcast::channel(capacity).0,
            slow: broadcast::channel(capacity).0,
            gpu: broadcast::channel(capacity).0,
        }
    }

    fn sender(&self, tier: Tier) -> &broadcast::Sender<MetricSnapshot> {
        match tier {
            Tier::Fast => &self.fast,
            Tier::Medium => &self.medium,
            Tier::Slow => &self.slow,
            Tier::Gpu => &self.gpu,
        }
    }

    fn emit(&self, snapshot: MetricSnapshot) {
        log::trace!("{} snapshot: {} values", snapshot.tier.as_str(), snapshot.values.len());
        // send() only fails when nobody is subscribed, which is fine
        let _ = self.sender(snapshot.tier).send(snapshot);
    }
}

/// Builds a snapshot holding only enabled keys.
struct SnapshotBuilder<'a> {
    enabled: &'a EnabledSet,
    snapshot: MetricSnapshot,
}

impl<'a> SnapshotBuilder<'a> {
    fn new(tier: Tier, enabled: &'a EnabledSet) -> Self {
        Self {
            enabled,
            snapshot: MetricSnapshot::new(tier),
        }
    }

    fn put(&mut self, key: MetricKey, value: impl Into<MetricValue>) {
        if self.enabled.is_enabled(key) {
            self.snapshot.insert(key, value);
        }
    }

    /// `None` when every key was filtered out.
    fn finish(self) -> Option<MetricSnapshot> {
        (!self.snapshot.is_empty()).then_some(self.snapshot)
    }
}

/// Providers plus the state the worker mutates between ticks.
struct Sampler {
    host: Box<dyn HostMetricsSource>,
    gpu: GpuMetricsProvider,
    registry: Arc<StatEnablementRegistry>,
    channels: TierChannels,
    config: CollectorConfig,
    clock: Box<dyn Clock>,
    last_net: NetworkCounters,
    last_net_at: Instant,
    ram_speed: String,
}

impl Sampler {
    fn collect_fast(&mut self, enabled: &EnabledSet) -> Option<MetricSnapshot> {
        // Counters advance every fast tick so a re-enabled rate starts from a fresh baseline
        let net = self.host.network();
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(self.last_net_at);
        let down = throughput_kbps(self.last_net.bytes_recv, net.bytes_recv, elapsed);
        let up = throughput_kbps(self.last_net.bytes_sent, net.bytes_sent, elapsed);
        self.last_net = net;
        self.last_net_at = now;

        let mut out = SnapshotBuilder::new(Tier::Fast, enabled);

        if enabled.is_enabled(MetricKey::CpuUsage) || enabled.is_enabled(MetricKey::CpuCores) {
            let cpu = self.host.cpu();
            out.put(MetricKey::CpuUsage, cpu.total_usage);
            out.put(MetricKey::CpuCores, cpu.core_count());
        }

        if [MetricKey::RamPercent, MetricKey::RamUsed, MetricKey::RamTotal]
            .iter()
            .any(|key| enabled.is_enabled(*key))
        {
            let ram = self.host.memory();
            out.put(MetricKey::RamPercent, ram.percent);
            out.put(MetricKey::RamUsed, ram.used_gb);
            out.put(MetricKey::RamTotal, ram.total_gb);
        }

        out.put(MetricKey::RamSpeed, self.ram_speed.clone());
        out.put(MetricKey::NetDownSpeed, down);
        out.put(MetricKey::NetUpSpeed, up);

        out.finish()
    }

    fn collect_medium(&mut self, enabled: &EnabledSet) -> Option<MetricSnapshot> {
        let mut out = SnapshotBuilder::new(Tier::Medium, enabled);
        if enabled.is_enabled(MetricKey::ProcessCount) {
            out.put(MetricKey::ProcessCount, self.host.process_count());
        }
        out.finish()
    }

    fn collect_slow(&mut self, enabled: &EnabledSet) -> Option<MetricSnapshot> {
        let mut out = SnapshotBuilder::new(Tier::Slow, enabled);

        if enabled.is_enabled(MetricKey::DiskPercent) {
            out.put(MetricKey::DiskPercent, self.host.disk().percent);
        }

        if enabled.is_enabled(MetricKey::UptimeHours) || enabled.is_enabled(MetricKey::UptimeMinutes) {
            let (hours, minutes) = split_uptime(self.host.uptime_secs());
            out.put(MetricKey::UptimeHours, hours);
            out.put(MetricKey::UptimeMinutes, minutes);
        }

        out.finish()
    }

    /// Always yields a snapshot (carrying `available`) unless every GPU key is disabled.
    fn collect_gpu(&mut self, enabled: &EnabledSet) -> Option<MetricSnapshot> {
        if !enabled.any_enabled(Tier::Gpu) {
            return None;
        }

        let mut out = SnapshotBuilder::new(Tier::Gpu, enabled);

        match self.gpu.stats() {
            Some(stats) => {
                out.snapshot.available = Some(true);
                out.put(MetricKey::GpuUsage, stats.gpu_usage);
                out.put(MetricKey::VramUsed, stats.vram_used_mb / 1024.0);
                out.put(MetricKey::VramTotal, stats.vram_total_mb / 1024.0);
                out.put(MetricKey::VramPercent, stats.vram_percent);
                out.put(MetricKey::GpuTemp, stats.temperature_celsius);
                out.put(MetricKey::GpuPower, stats.power_draw_watts);
                out.put(MetricKey::GpuFan, stats.fan_speed_percent);
                out.put(MetricKey::GpuClock, stats.core_clock_mhz);
            }
            None => out.snapshot.available = Some(false),
        }

        Some(out.snapshot)
    }

    /// Sampling half of one loop iteration.
    fn tick(&mut self, tick: u64) {
        let enabled = self.registry.snapshot();

        if let Some(snapshot) = self.collect_fast(&enabled) {
            self.channels.emit(snapshot);
        }

        if tier_fires(tick, self.config.medium_every) {
            if let Some(snapshot) = self.collect_medium(&enabled) {
                self.channels.emit(snapshot);
            }
        }

        if tier_fires(tick, self.config.slow_every) {
            if let Some(snapshot) = self.collect_slow(&enabled) {
                self.channels.emit(snapshot);
            }
        }

        let sample_gpu = if self.gpu.is_available() {
            true
        } else if tier_fires(tick, self.config.gpu_reprobe_every) {
            // Construction just probed; don't repeat it on the first tick
            if tick > 0 {
                self.gpu.reprobe();
            }
            true
        } else {
            false
        };

        if sample_gpu {
            if let Some(snapshot) = self.collect_gpu(&enabled) {
                self.channels.emit(snapshot);
            }
        }
    }

    fn refresh_all(&mut self) {
        let enabled = self.registry.snapshot();

        let snapshots = [
            self.collect_fast(&enabled),
            self.collect_medium(&enabled),
            self.collect_slow(&enabled),
            self.collect_gpu(&enabled),
        ];

        for snapshot in snapshots.into_iter().flatten() {
            self.channels.emit(snapshot);
        }
    }
}

/// Multi-rate sampler running on a dedicated `metrics-worker` thread.
pub struct TieredCollector {
    sampler: Arc<Mutex<Sampler>>,
    registry: Arc<StatEnablementRegistry>,
    channels: TierChannels,
    running: Arc<AtomicBool>,
    state: CollectorState,
    worker: Option<JoinHandle<()>>,
    config: CollectorConfig,
}

impl TieredCollector {
    /// Collector over the real host and GPU with default cadences.
    pub fn new(registry: Arc<StatEnablementRegistry>) -> Self {
        Self::with_sources(
            Box::new(HostMetricsProvider::new()),
            GpuMetricsProvider::system(),
            registry,
            CollectorConfig::default(),
        )
    }

    pub fn with_sources(
        mut host: Box<dyn HostMetricsSource>,
        gpu: GpuMetricsProvider,
        registry: Arc<StatEnablementRegistry>,
        config: CollectorConfig,
    ) -> Self {
        let channels = TierChannels::new(config.channel_capacity);

        // Baseline so the first fast tick reports a delta, not the total since boot
        let clock: Box<dyn Clock> = Box::new(SystemClock);
        let last_net = host.network();
        let last_net_at = clock.now();
        let ram_speed = host.ram_speed();

        let sampler = Sampler {
            host,
            gpu,
            registry: Arc::clone(&registry),
            channels: channels.clone(),
            config: config.clone(),
            clock,
            last_net,
            last_net_at,
            ram_speed,
        };

        Self {
            sampler: Arc::new(Mutex::new(sampler)),
            registry,
            channels,
            running: Arc::new(AtomicBool::new(false)),
            state: CollectorState::Idle,
            worker: None,
            config,
        }
    }

    /// Replace the time source used for network rates. The counter baseline
    /// is re-stamped with the new clock.
    pub fn with_clock(self, clock: Box<dyn Clock>) -> Self {
        {
            let mut sampler = self.sampler.lock();
            sampler.last_net_at = clock.now();
            sampler.clock = clock;
        }
        self
    }

    /// Spawn the worker thread and return immediately.
    pub fn start(&mut self) -> Result<()> {
        if self.state != CollectorState::Idle {
            return Err(SystemizerError::AlreadyStarted);
        }

        self.running.store(true, Ordering::Release);

        let sampler = Arc::clone(&self.sampler);
        let running = Arc::clone(&self.running);
        let period = self.config.period;

        let handle = thread::Builder::new()
            .name("metrics-worker".to_string())
            .spawn(move || run_loop(sampler, running, period))
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                SystemizerError::WorkerSpawn(e)
            })?;

        log::info!("Metrics worker started ({:?} period)", period);
        self.worker = Some(handle);
        self.state = CollectorState::Running;
        Ok(())
    }

    /// Stop the worker and wait for it. No events fire after this returns.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.worker.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                log::error!("Metrics worker panicked");
            }
            log::info!("Metrics worker stopped");
        }

        self.state = CollectorState::Stopped;
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Run every tier once on the calling thread and emit the results.
    /// Does nothing once the collector is stopped.
    pub fn force_refresh_all(&self) {
        if self.state == CollectorState::Stopped {
            return;
        }
        self.sampler.lock().refresh_all();
    }

    /// Run the sampling part of loop iteration `tick` on the calling thread.
    pub fn sample_tick(&self, tick: u64) {
        self.sampler.lock().tick(tick);
    }

    /// Takes effect from the next tick.
    pub fn set_metric_enabled(&self, key: MetricKey, enabled: bool) {
        self.registry.set_enabled(key, enabled);
    }

    pub fn registry(&self) -> &Arc<StatEnablementRegistry> {
        &self.registry
    }

    pub fn subscribe(&self, tier: Tier) -> broadcast::Receiver<MetricSnapshot> {
        self.channels.sender(tier).subscribe()
    }

    pub fn gpu_info(&self) -> GpuInfo {
        self.sampler.lock().gpu.info()
    }
}

impl Drop for TieredCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(sampler: Arc<Mutex<Sampler>>, running: Arc<AtomicBool>, period: Duration) {
    let mut tick: u64 = 0;

    while running.load(Ordering::Acquire) {
        let started = Instant::now();

        sampler.lock().tick(tick);
        tick = tick.wrapping_add(1);

        // Single-step compensation: sleep off what's left of this period, if anything
        let deadline = started + period;
        loop {
            let now = Instant::now();
            if now >= deadline || !running.load(Ordering::Acquire) {
                break;
            }
            thread::park_timeout(deadline - now);
        }
    }
}
