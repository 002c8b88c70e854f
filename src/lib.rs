// Systemizer Library - Public API

// Re-export error types
pub mod error;
pub use error::{Result, SystemizerError};

// Module declarations
pub mod commands;
pub mod core;
pub mod platform;

// Re-export commonly used types
pub use crate::core::{
    CollectorConfig, GpuMetricsProvider, HostMetricsProvider, MetricKey, MetricSnapshot,
    MetricValue, StatEnablementRegistry, TieredCollector, Tier,
};

// Initialize logging
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
