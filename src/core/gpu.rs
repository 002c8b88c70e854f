//! GPU metrics provider with vendor fallback.
//!
//! Detection runs once. The provider then holds a single backend chosen from
//! the vendor's native library, falling back to generic OS counters, and
//! turns any backend failure into an "unavailable" state instead of an error.

use super::metrics::{GpuInfo, GpuStats, GpuVendor};
use crate::error::Result;

/// Name reported when no backend could be initialised.
pub const NO_GPU_NAME: &str = "No GPU Detected";

/// One vendor's telemetry source.
///
/// `collect_stats` absorbs per-field failures (the field reads zero) and
/// returns `Err` only when the device itself can no longer be queried.
pub trait GpuBackend: Send {
    fn vendor(&self) -> GpuVendor;

    fn name(&self) -> &str;

    fn vram_total_mb(&self) -> f64;

    fn collect_stats(&mut self) -> Result<GpuStats>;
}

/// OS-facing half of GPU discovery.
pub trait GpuProbe: Send {
    /// Descriptive name of the primary display adapter.
    fn adapter_name(&self) -> Result<String>;

    /// Initialise the native backend for a recognised vendor.
    fn init_vendor(&self, vendor: GpuVendor) -> Result<Box<dyn GpuBackend>>;

    /// Initialise the OS-counter backend that works for any adapter.
    fn init_generic(&self) -> Result<Box<dyn GpuBackend>>;
}

/// Map an adapter name to a vendor by case-insensitive substring match.
pub fn detect_vendor(adapter_name: &str) -> GpuVendor {
    let name = adapter_name.to_ascii_uppercase();

    if name.contains("NVIDIA") {
        GpuVendor::Nvidia
    } else if name.contains("AMD") || name.contains("RADEON") {
        GpuVendor::Amd
    } else if name.contains("INTEL") {
        GpuVendor::Intel
    } else {
        GpuVendor::Generic
    }
}

/// Strip trademark glyphs and marketing words, normalise vendor casing and whitespace.
pub fn sanitize_name(name: &str) -> String {
    if name.trim().is_empty() {
        return "Unknown GPU".to_string();
    }

    const NOISE: [&str; 9] = [
        "™", "(TM)", "®", "(R)", "©", "(C)", "Corporation", "Graphics", "Series",
    ];

    let mut cleaned = name.to_string();
    for noise in NOISE {
        cleaned = cleaned.replace(noise, "");
    }
    cleaned = cleaned.replace("NVIDIA", "Nvidia");

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `used / total * 100`, or 0 when the total is unknown.
pub fn vram_percent(used_mb: f64, total_mb: f64) -> f64 {
    if total_mb > 0.0 {
        used_mb / total_mb * 100.0
    } else {
        0.0
    }
}

/// Serves normalised GPU stats from whichever backend initialised.
pub struct GpuMetricsProvider {
    probe: Box<dyn GpuProbe>,
    detected: GpuVendor,
    backend: Option<Box<dyn GpuBackend>>,
    name: String,
    available: bool,
}

impl GpuMetricsProvider {
    /// Detect the vendor and bring up the best backend.
    pub fn new(probe: Box<dyn GpuProbe>) -> Self {
        let detected = detect_with(probe.as_ref());
        log::info!("Detected GPU vendor: {:?}", detected);

        let mut provider = Self {
            probe,
            detected,
            backend: None,
            name: NO_GPU_NAME.to_string(),
            available: false,
        };
        provider.install(initialize_backend(provider.probe.as_ref(), detected));
        provider
    }

    /// Provider backed by the real OS queries and vendor libraries.
    pub fn system() -> Self {
        Self::new(Box::new(crate::platform::gpu::SystemGpuProbe::new()))
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Vendor found by detection, before any fallback.
    pub fn detected_vendor(&self) -> GpuVendor {
        self.detected
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> GpuInfo {
        GpuInfo {
            vendor: self
                .backend
                .as_ref()
                .map(|b| b.vendor())
                .unwrap_or(self.detected),
            name: self.name.clone(),
            vram_total_mb: self.backend.as_ref().map(|b| b.vram_total_mb()).unwrap_or(0.0),
            available: self.available,
        }
    }

    /// Current stats, or `None` when no GPU is usable.
    ///
    /// A backend error disables the provider until the next [`reprobe`](Self::reprobe).
    pub fn stats(&mut self) -> Option<GpuStats> {
        if !self.available {
            return None;
        }
        let backend = self.backend.as_mut()?;

        match backend.collect_stats() {
            Ok(mut stats) => {
                stats.vram_percent = vram_percent(stats.vram_used_mb, stats.vram_total_mb);
                Some(stats)
            }
            Err(e) => {
                log::warn!(
                    "Failed to get stats for {:?} GPU: {}. Disabling GPU polling",
                    backend.vendor(),
                    e
                );
                self.available = false;
                // Release the native handle; reprobe builds a fresh one
                self.backend = None;
                None
            }
        }
    }

    /// Re-run initialisation (and detection, if it never succeeded).
    ///
    /// Returns the new availability.
    pub fn reprobe(&mut self) -> bool {
        if self.available {
            return true;
        }

        if self.detected == GpuVendor::Unavailable {
            self.detected = detect_with(self.probe.as_ref());
        }

        self.backend = None;
        let backend = initialize_backend(self.probe.as_ref(), self.detected);
        self.install(backend);

        if self.available {
            log::info!("GPU became available: {}", self.name);
        } else {
            log::debug!("GPU re-probe found nothing");
        }
        self.available
    }

    fn install(&mut self, backend: Option<Box<dyn GpuBackend>>) {
        match backend {
            Some(backend) => {
                self.name = sanitize_name(backend.name());
                self.available = true;
                self.backend = Some(backend);
            }
            None => {
                self.name = NO_GPU_NAME.to_string();
                self.available = false;
                self.backend = None;
            }
        }
    }
}

fn detect_with(probe: &dyn GpuProbe) -> GpuVendor {
    match probe.adapter_name() {
        Ok(name) => detect_vendor(&name),
        Err(e) => {
            log::warn!("Failed to detect GPU vendor: {}", e);
            GpuVendor::Unavailable
        }
    }
}

/// Vendor library first, generic OS counters second.
fn initialize_backend(probe: &dyn GpuProbe, vendor: GpuVendor) -> Option<Box<dyn GpuBackend>> {
    if matches!(vendor, GpuVendor::Nvidia | GpuVendor::Amd | GpuVendor::Intel) {
        match probe.init_vendor(vendor) {
            Ok(backend) => {
                log::info!("Initialized {:?} GPU: {}", vendor, backend.name());
                return Some(backend);
            }
            Err(e) => log::warn!(
                "Failed to initialize {:?} GPU monitor: {}. Falling back to generic",
                vendor,
                e
            ),
        }
    }

    match probe.init_generic() {
        Ok(backend) => {
            log::info!("Initialized generic GPU monitor: {}", backend.name());
            Some(backend)
        }
        Err(e) => {
            log::error!("Generic GPU monitor also failed: {}", e);
            None
        }
    }
}
