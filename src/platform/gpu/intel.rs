use super::counters::{self, EngineScope};
use crate::core::gpu::GpuBackend;
use crate::core::metrics::{GpuStats, GpuVendor};
use crate::error::{Result, SystemizerError};

/// Intel backend built on OS queries scoped to the Intel adapter.
///
/// Memory is the OS-reported shared budget; power, fan and clock are not
/// measurable here.
pub struct IntelBackend {
    name: String,
    vram_total_mb: f64,
}

impl IntelBackend {
    pub fn new() -> Result<Self> {
        let adapter = counters::intel_adapter()
            .map_err(|e| SystemizerError::intel_query(format!("Intel adapter query failed: {}", e)))?;

        Ok(Self {
            name: adapter.name,
            vram_total_mb: adapter.memory_mb,
        })
    }
}

impl GpuBackend for IntelBackend {
    fn vendor(&self) -> GpuVendor {
        GpuVendor::Intel
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn vram_total_mb(&self) -> f64 {
        self.vram_total_mb
    }

    fn collect_stats(&mut self) -> Result<GpuStats> {
        let utilization = counters::engine_utilization(EngineScope::Intel)?;

        // Most firmware doesn't expose an ACPI zone; zero is the norm
        let temperature = counters::thermal_zone_celsius().unwrap_or(0.0);

        Ok(GpuStats {
            gpu_usage: utilization,
            vram_used_mb: counters::dedicated_memory_used_mb_or_zero(),
            vram_total_mb: self.vram_total_mb,
            vram_percent: 0.0,
            temperature_celsius: temperature,
            power_draw_watts: 0.0,
            fan_speed_percent: 0.0,
            core_clock_mhz: 0.0,
        })
    }
}
