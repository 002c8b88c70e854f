#[cfg(feature = "nvml")]
use nvml_wrapper::{
    enum_wrappers::device::{Clock, TemperatureSensor},
    error::NvmlError,
    Device, Nvml,
};

use crate::core::gpu::GpuBackend;
use crate::core::metrics::{GpuStats, GpuVendor};
use crate::error::{Result, SystemizerError};

#[cfg(feature = "nvml")]
use crate::core::metrics::BYTES_PER_MB;

/// NVIDIA backend using NVML
///
/// NVML is shut down when the backend is dropped.
pub struct NvidiaBackend {
    #[cfg(feature = "nvml")]
    nvml: Nvml,
    #[cfg_attr(not(feature = "nvml"), allow(dead_code))]
    device_index: u32,
    name: String,
    vram_total_mb: f64,
}

impl NvidiaBackend {
    /// Initialise NVML and capture the first device.
    pub fn new() -> Result<Self> {
        #[cfg(feature = "nvml")]
        {
            let nvml = Nvml::init()
                .map_err(|e| SystemizerError::nvidia_library(format!("Failed to init NVML: {}", e)))?;

            let count = nvml.device_count().map_err(|e| {
                SystemizerError::nvidia_library(format!("Failed to count devices: {}", e))
            })?;
            if count == 0 {
                return Err(SystemizerError::nvidia_library("No NVIDIA devices found by NVML"));
            }

            let (name, vram_total_mb) = {
                let device = nvml.device_by_index(0).map_err(|e| {
                    SystemizerError::nvidia_library(format!("GPU 0 not found: {}", e))
                })?;
                let name = device
                    .name()
                    .unwrap_or_else(|_| "Unknown NVIDIA GPU".to_string());
                let memory = device.memory_info().map_err(|e| {
                    SystemizerError::nvidia_library(format!("Failed to get memory info: {}", e))
                })?;
                (name, memory.total as f64 / BYTES_PER_MB)
            };

            Ok(Self {
                nvml,
                device_index: 0,
                name,
                vram_total_mb,
            })
        }
        #[cfg(not(feature = "nvml"))]
        {
            Err(SystemizerError::nvidia_library(
                "NVIDIA GPU support not enabled",
            ))
        }
    }

    #[cfg(feature = "nvml")]
    fn get_device(&self) -> Result<Device<'_>> {
        self.nvml
            .device_by_index(self.device_index)
            .map_err(|e| SystemizerError::metric_collection(format!("Failed to get GPU device: {}", e)))
    }
}

/// Keep a field read that failed as `None`, except when the GPU fell off the bus.
#[cfg(feature = "nvml")]
fn field<T>(read: std::result::Result<T, NvmlError>) -> Result<Option<T>> {
    match read {
        Ok(value) => Ok(Some(value)),
        Err(NvmlError::GpuLost) => Err(SystemizerError::metric_collection("GPU is lost")),
        Err(_) => Ok(None),
    }
}

impl GpuBackend for NvidiaBackend {
    fn vendor(&self) -> GpuVendor {
        GpuVendor::Nvidia
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn vram_total_mb(&self) -> f64 {
        self.vram_total_mb
    }

    fn collect_stats(&mut self) -> Result<GpuStats> {
        #[cfg(feature = "nvml")]
        {
            let device = self.get_device()?;

            let utilization = field(device.utilization_rates())?.map(|u| u.gpu).unwrap_or(0);

            let vram_used_mb = field(device.memory_info())?
                .map(|m| m.used as f64 / BYTES_PER_MB)
                .unwrap_or(0.0);

            let temperature = field(device.temperature(TemperatureSensor::Gpu))?.unwrap_or(0);

            let power_draw = field(device.power_usage())?
                .map(|mw| mw as f64 / 1000.0) // mW to W
                .unwrap_or(0.0);

            let fan_speed = field(device.fan_speed(0))?.unwrap_or(0);

            let core_clock = field(device.clock_info(Clock::Graphics))?.unwrap_or(0);

            Ok(GpuStats {
                gpu_usage: utilization as f64,
                vram_used_mb,
                vram_total_mb: self.vram_total_mb,
                vram_percent: 0.0,
                temperature_celsius: temperature as f64,
                power_draw_watts: power_draw,
                fan_speed_percent: fan_speed as f64,
                core_clock_mhz: core_clock as f64,
            })
        }
        #[cfg(not(feature = "nvml"))]
        {
            Err(SystemizerError::nvidia_library(
                "NVIDIA GPU support not enabled",
            ))
        }
    }
}
