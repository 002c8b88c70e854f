use crate::core::gpu::GpuBackend;
use crate::core::metrics::{GpuStats, GpuVendor};
use crate::error::{Result, SystemizerError};

#[cfg(all(unix, feature = "rocm"))]
use rocm_smi_lib::{DeviceHandle, RocmSmi, TemperatureMetric};

#[cfg(all(unix, feature = "rocm"))]
use super::counters;

/// Fan reading in whatever shape the binding hands back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FanReading {
    /// Raw PWM level against its maximum.
    Raw { speed: f64, max: f64 },
    Unrecognized,
}

/// Full-scale PWM level used by amdgpu.
pub const PWM_MAX: f64 = 255.0;

impl FanReading {
    /// A raw fan level from ROCm SMI, scaled against `max` (or [`PWM_MAX`]).
    pub fn from_raw(speed: f64, max: Option<f64>) -> Self {
        if !speed.is_finite() || speed < 0.0 {
            return FanReading::Unrecognized;
        }

        let max = max
            .filter(|m| m.is_finite() && *m > 0.0)
            .unwrap_or(PWM_MAX);

        FanReading::Raw { speed, max }
    }

    pub fn percent(&self) -> f64 {
        match *self {
            FanReading::Raw { speed, max } if max > 0.0 => (speed / max * 100.0).min(100.0),
            _ => 0.0,
        }
    }
}

/// AMD backend using ROCm SMI
///
/// ROCm SMI does not report a memory budget we trust, so capacity comes from
/// the OS adapter query and usage from the dedicated-memory counter.
pub struct AmdBackend {
    #[cfg(all(unix, feature = "rocm"))]
    rocm: RocmSmi,
    #[allow(dead_code)]
    device_index: u32,
    name: String,
    vram_total_mb: f64,
}

impl AmdBackend {
    /// Initialise ROCm SMI and select the first GPU.
    pub fn new() -> Result<Self> {
        #[cfg(all(unix, feature = "rocm"))]
        {
            let rocm = RocmSmi::init()
                .map_err(|e| SystemizerError::amd_library(format!("Failed to init ROCm SMI: {:?}", e)))?;

            let device_count = rocm
                .get_device_count()
                .map_err(|e| SystemizerError::amd_library(format!("Failed to get device count: {:?}", e)))?;
            if device_count == 0 {
                return Err(SystemizerError::amd_library("No AMD devices found by ROCm SMI"));
            }

            let mut backend = Self {
                rocm,
                device_index: 0,
                name: String::new(),
                vram_total_mb: 0.0,
            };

            let device = backend
                .get_device()
                .map_err(|e| SystemizerError::amd_library(e.to_string()))?;
            backend.name = backend
                .rocm
                .get_device_name(&device)
                .unwrap_or_else(|_| "Unknown AMD GPU".to_string());

            // Capacity is always backfilled from the generic adapter query
            backend.vram_total_mb = counters::primary_adapter()
                .map(|adapter| adapter.memory_mb)
                .unwrap_or(0.0);

            Ok(backend)
        }
        #[cfg(not(all(unix, feature = "rocm")))]
        {
            Err(SystemizerError::amd_library(
                "AMD GPU support not enabled or not on Unix",
            ))
        }
    }

    #[cfg(all(unix, feature = "rocm"))]
    fn get_device(&self) -> Result<DeviceHandle> {
        self.rocm
            .get_device_handle(self.device_index)
            .map_err(|e| SystemizerError::metric_collection(format!("Failed to get GPU device: {:?}", e)))
    }
}

impl GpuBackend for AmdBackend {
    fn vendor(&self) -> GpuVendor {
        GpuVendor::Amd
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn vram_total_mb(&self) -> f64 {
        self.vram_total_mb
    }

    fn collect_stats(&mut self) -> Result<GpuStats> {
        #[cfg(all(unix, feature = "rocm"))]
        {
            let device = self.get_device()?;

            let utilization = self.rocm.get_busy_percent(&device).unwrap_or(0) as f64;

            let temperature = self
                .rocm
                .get_temperature(&device, TemperatureMetric::Edge)
                .map(|t| t as f64)
                .unwrap_or(0.0);

            let fan = self
                .rocm
                .get_fan_speed(&device, 0)
                .map(|f| FanReading::from_raw(f as f64, None)) // amdgpu reports on the PWM scale
                .unwrap_or(FanReading::Unrecognized);

            Ok(GpuStats {
                gpu_usage: utilization,
                vram_used_mb: counters::dedicated_memory_used_mb_or_zero(),
                vram_total_mb: self.vram_total_mb,
                vram_percent: 0.0,
                temperature_celsius: temperature,
                // Not exposed on this path
                power_draw_watts: 0.0,
                fan_speed_percent: fan.percent(),
                core_clock_mhz: 0.0,
            })
        }
        #[cfg(not(all(unix, feature = "rocm")))]
        {
            Err(SystemizerError::amd_library(
                "AMD GPU support not enabled or not on Unix",
            ))
        }
    }
}
