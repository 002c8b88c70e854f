use super::counters::{self, EngineScope};
use crate::core::gpu::GpuBackend;
use crate::core::metrics::{GpuStats, GpuVendor};
use crate::error::{Result, SystemizerError};

/// Vendor-neutral backend over OS counters.
///
/// Works for any adapter the OS can list. Only utilization and memory are
/// measurable; every other field reads zero.
pub struct GenericBackend {
    name: String,
    vram_total_mb: f64,
}

impl GenericBackend {
    pub fn new() -> Result<Self> {
        let adapter = counters::primary_adapter().map_err(|e| {
            SystemizerError::gpu_not_available(format!("Failed to initialize generic monitor: {}", e))
        })?;

        Ok(Self {
            name: adapter.name,
            vram_total_mb: adapter.memory_mb,
        })
    }
}

impl GpuBackend for GenericBackend {
    fn vendor(&self) -> GpuVendor {
        GpuVendor::Generic
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn vram_total_mb(&self) -> f64 {
        self.vram_total_mb
    }

    fn collect_stats(&mut self) -> Result<GpuStats> {
        let utilization = counters::engine_utilization(EngineScope::All)?;

        Ok(GpuStats {
            gpu_usage: utilization.trunc(),
            vram_used_mb: counters::dedicated_memory_used_mb_or_zero(),
            vram_total_mb: self.vram_total_mb,
            ..Default::default()
        })
    }
}
