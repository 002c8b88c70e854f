//! GPU-specific platform code.
//!
//! Provides the OS-facing probe and one backend per vendor:
//! NVIDIA (via NVML), AMD (via ROCm SMI), Intel and generic (via OS counters).

pub mod amd;
pub mod counters;
pub mod generic;
pub mod intel;
pub mod nvidia;

pub use amd::AmdBackend;
pub use generic::GenericBackend;
pub use intel::IntelBackend;
pub use nvidia::NvidiaBackend;

use crate::core::gpu::{GpuBackend, GpuProbe};
use crate::core::metrics::GpuVendor;
use crate::error::{Result, SystemizerError};

/// Probe backed by the real OS and vendor libraries.
#[derive(Debug, Default)]
pub struct SystemGpuProbe;

impl SystemGpuProbe {
    pub fn new() -> Self {
        Self
    }
}

impl GpuProbe for SystemGpuProbe {
    fn adapter_name(&self) -> Result<String> {
        counters::primary_adapter().map(|adapter| adapter.name)
    }

    fn init_vendor(&self, vendor: GpuVendor) -> Result<Box<dyn GpuBackend>> {
        match vendor {
            GpuVendor::Nvidia => Ok(Box::new(NvidiaBackend::new()?)),
            GpuVendor::Amd => Ok(Box::new(AmdBackend::new()?)),
            GpuVendor::Intel => Ok(Box::new(IntelBackend::new()?)),
            other => Err(SystemizerError::gpu_not_available(format!(
                "No native backend for {:?}",
                other
            ))),
        }
    }

    fn init_generic(&self) -> Result<Box<dyn GpuBackend>> {
        Ok(Box::new(GenericBackend::new()?))
    }
}
