use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SystemizerError;

/// Every metric the collector knows how to emit.
///
/// The set is closed: snapshots never carry keys outside this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    CpuUsage,
    CpuCores,
    RamPercent,
    RamUsed,
    RamTotal,
    RamSpeed,
    NetDownSpeed,
    NetUpSpeed,
    ProcessCount,
    DiskPercent,
    UptimeHours,
    UptimeMinutes,
    GpuUsage,
    VramUsed,
    VramTotal,
    VramPercent,
    GpuTemp,
    GpuPower,
    GpuFan,
    GpuClock,
}

impl MetricKey {
    pub const ALL: [MetricKey; 20] = [
        MetricKey::CpuUsage,
        MetricKey::CpuCores,
        MetricKey::RamPercent,
        MetricKey::RamUsed,
        MetricKey::RamTotal,
        MetricKey::RamSpeed,
        MetricKey::NetDownSpeed,
        MetricKey::NetUpSpeed,
        MetricKey::ProcessCount,
        MetricKey::DiskPercent,
        MetricKey::UptimeHours,
        MetricKey::UptimeMinutes,
        MetricKey::GpuUsage,
        MetricKey::VramUsed,
        MetricKey::VramTotal,
        MetricKey::VramPercent,
        MetricKey::GpuTemp,
        MetricKey::GpuPower,
        MetricKey::GpuFan,
        MetricKey::GpuClock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::CpuUsage => "cpu_usage",
            MetricKey::CpuCores => "cpu_cores",
            MetricKey::RamPercent => "ram_percent",
            MetricKey::RamUsed => "ram_used",
            MetricKey::RamTotal => "ram_total",
            MetricKey::RamSpeed => "ram_speed",
            MetricKey::NetDownSpeed => "net_down_speed",
            MetricKey::NetUpSpeed => "net_up_speed",
            MetricKey::ProcessCount => "process_count",
            MetricKey::DiskPercent => "disk_percent",
            MetricKey::UptimeHours => "uptime_hours",
            MetricKey::UptimeMinutes => "uptime_minutes",
            MetricKey::GpuUsage => "gpu_usage",
            MetricKey::VramUsed => "vram_used",
            MetricKey::VramTotal => "vram_total",
            MetricKey::VramPercent => "vram_percent",
            MetricKey::GpuTemp => "gpu_temp",
            MetricKey::GpuPower => "gpu_power",
            MetricKey::GpuFan => "gpu_fan",
            MetricKey::GpuClock => "gpu_clock",
        }
    }

    /// The tier whose snapshots carry this key.
    pub fn tier(&self) -> Tier {
        match self {
            MetricKey::CpuUsage
            | MetricKey::CpuCores
            | MetricKey::RamPercent
            | MetricKey::RamUsed
            | MetricKey::RamTotal
            | MetricKey::RamSpeed
            | MetricKey::NetDownSpeed
            | MetricKey::NetUpSpeed => Tier::Fast,
            MetricKey::ProcessCount => Tier::Medium,
            MetricKey::DiskPercent | MetricKey::UptimeHours | MetricKey::UptimeMinutes => {
                Tier::Slow
            }
            MetricKey::GpuUsage
            | MetricKey::VramUsed
            | MetricKey::VramTotal
            | MetricKey::VramPercent
            | MetricKey::GpuTemp
            | MetricKey::GpuPower
            | MetricKey::GpuFan
            | MetricKey::GpuClock => Tier::Gpu,
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = SystemizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| SystemizerError::config(format!("Unknown metric key: {}", s)))
    }
}

/// Sampling cadence a snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Fast,
    Medium,
    Slow,
    Gpu,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Fast, Tier::Medium, Tier::Slow, Tier::Gpu];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Fast => "fast",
            Tier::Medium => "medium",
            Tier::Slow => "slow",
            Tier::Gpu => "gpu",
        }
    }

    /// Keys this tier can emit.
    pub fn keys(&self) -> impl Iterator<Item = MetricKey> + '_ {
        MetricKey::ALL.into_iter().filter(move |key| key.tier() == *self)
    }
}

impl FromStr for Tier {
    type Err = SystemizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .iter()
            .copied()
            .find(|tier| tier.as_str() == s.trim())
            .ok_or_else(|| SystemizerError::config(format!("Unknown tier: {}", s)))
    }
}

/// A single metric reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(u64),
    Float(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Count(v) => Some(*v as f64),
            MetricValue::Float(v) => Some(*v),
            MetricValue::Text(_) => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<f32> for MetricValue {
    fn from(v: f32) -> Self {
        MetricValue::Float(v as f64)
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Count(v)
    }
}

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        MetricValue::Count(v as u64)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

/// Values produced by one tier on one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub tier: Tier,
    pub timestamp: i64, // Unix timestamp
    /// Set on gpu snapshots only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    pub values: BTreeMap<MetricKey, MetricValue>,
}

impl MetricSnapshot {
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            timestamp: chrono::Utc::now().timestamp(),
            available: None,
            values: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: MetricKey, value: impl Into<MetricValue>) {
        self.values.insert(key, value.into());
    }

    pub fn get(&self, key: MetricKey) -> Option<&MetricValue> {
        self.values.get(&key)
    }

    pub fn get_f64(&self, key: MetricKey) -> Option<f64> {
        self.get(key).and_then(MetricValue::as_f64)
    }

    pub fn contains(&self, key: MetricKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = MetricKey> + '_ {
        self.values.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Generic,
    #[default]
    Unavailable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuStats {
    pub total_usage: f32,
    pub per_core: Vec<f32>,
}

impl CpuStats {
    pub fn core_count(&self) -> usize {
        self.per_core.len()
    }
}

/// Physical memory and swap, in GB.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_gb: f64,
    pub available_gb: f64,
    pub used_gb: f64,
    pub percent: f64,
    pub swap_total_gb: f64,
    pub swap_used_gb: f64,
    pub swap_percent: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskStats {
    pub total_gb: f64,
    pub used_gb: f64,
    pub percent: f64,
}

/// Cumulative byte counters since boot, summed over all interfaces.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

/// Normalised GPU reading. Fields a backend cannot measure read zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GpuStats {
    pub gpu_usage: f64,
    pub vram_used_mb: f64,
    pub vram_total_mb: f64,
    pub vram_percent: f64,
    pub temperature_celsius: f64,
    pub power_draw_watts: f64,
    pub fan_speed_percent: f64,
    pub core_clock_mhz: f64,
}

/// Identity of the GPU the provider settled on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GpuInfo {
    pub vendor: GpuVendor,
    pub name: String,
    pub vram_total_mb: f64,
    pub available: bool,
}

pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
