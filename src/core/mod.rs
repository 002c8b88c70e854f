// Collector, providers and the types they exchange

pub mod collector;
pub mod gpu;
pub mod host;
pub mod metrics;
pub mod registry;
pub mod settings;

// Re-export commonly used items
pub use collector::{Clock, CollectorConfig, CollectorState, SystemClock, TieredCollector};
pub use gpu::{GpuBackend, GpuMetricsProvider, GpuProbe};
pub use host::{HostMetricsProvider, HostMetricsSource};
pub use metrics::{
    CpuStats, DiskStats, GpuInfo, GpuStats, GpuVendor, MemoryStats, MetricKey, MetricSnapshot,
    MetricValue, NetworkCounters, Tier,
};
pub use registry::{EnabledSet, StatEnablementRegistry};
pub use settings::Settings;
