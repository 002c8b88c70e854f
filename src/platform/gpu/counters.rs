//! OS-level GPU queries shared by the Intel and generic backends.
//!
//! Windows goes through CIM classes and performance counters via PowerShell;
//! Linux reads the DRM and thermal sysfs trees.

use crate::error::Result;

#[cfg(windows)]
use self::windows as imp;

#[cfg(target_os = "linux")]
use self::linux as imp;

#[cfg(not(any(windows, target_os = "linux")))]
use self::unsupported as imp;

/// Display adapter as reported by the OS.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterInfo {
    pub name: String,
    /// Advertised dedicated (or shared, for iGPUs) memory; 0 when unknown.
    pub memory_mb: f64,
}

/// Which engines a utilization read covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineScope {
    /// 3D engines on every adapter.
    All,
    /// Engines belonging to the Intel adapter.
    Intel,
}

/// First display adapter.
pub fn primary_adapter() -> Result<AdapterInfo> {
    imp::primary_adapter()
}

/// First adapter whose name matches "Intel".
pub fn intel_adapter() -> Result<AdapterInfo> {
    imp::intel_adapter()
}

/// Engine utilization in percent, capped at 100.
pub fn engine_utilization(scope: EngineScope) -> Result<f64> {
    imp::engine_utilization(scope).map(|v| v.clamp(0.0, 100.0))
}

pub fn dedicated_memory_used_mb() -> Result<f64> {
    imp::dedicated_memory_used_mb()
}

/// Dedicated memory in use, or 0 with a warning when the counter is missing.
pub fn dedicated_memory_used_mb_or_zero() -> f64 {
    dedicated_memory_used_mb().unwrap_or_else(|e| {
        log::warn!("Could not fetch VRAM usage: {}", e);
        0.0
    })
}

/// Best-effort board temperature from the ACPI thermal zone.
pub fn thermal_zone_celsius() -> Result<f64> {
    imp::thermal_zone_celsius()
}

/// ACPI reports thermal zones in tenths of a Kelvin.
pub fn tenths_kelvin_to_celsius(tenths: f64) -> f64 {
    tenths / 10.0 - 273.15
}

pub fn millidegrees_to_celsius(milli: f64) -> f64 {
    milli / 1000.0
}

#[cfg(windows)]
mod windows {
    use serde::Deserialize;

    use super::{tenths_kelvin_to_celsius, AdapterInfo, EngineScope};
    use crate::core::metrics::BYTES_PER_MB;
    use crate::error::{Result, SystemizerError};
    use crate::platform::command::{
        one_or_many, parse_counter_sum, run_powershell, run_powershell_json, COUNTER_TIMEOUT,
        QUERY_TIMEOUT,
    };

    const UTF8_PREFIX: &str = "[Console]::OutputEncoding = [System.Text.Encoding]::UTF8;";

    #[derive(Debug, Deserialize)]
    struct VideoControllerPs {
        #[serde(rename = "Caption")]
        caption: Option<String>,
        #[serde(rename = "AdapterRAM")]
        adapter_ram: Option<u64>,
    }

    fn query_adapter(filter: &str) -> Result<AdapterInfo> {
        let script = format!(
            "{UTF8_PREFIX} Get-CimInstance Win32_VideoController {filter}| Select-Object -First 1 Caption, AdapterRAM | ConvertTo-Json"
        );
        let raw: serde_json::Value = run_powershell_json(&script, QUERY_TIMEOUT)?;
        let controller = one_or_many::<VideoControllerPs>(raw)?
            .into_iter()
            .next()
            .ok_or_else(|| SystemizerError::gpu_not_available("No video controller reported"))?;

        Ok(AdapterInfo {
            name: controller.caption.unwrap_or_else(|| "Generic GPU".to_string()),
            memory_mb: controller.adapter_ram.unwrap_or(0) as f64 / BYTES_PER_MB,
        })
    }

    pub fn primary_adapter() -> Result<AdapterInfo> {
        query_adapter("")
    }

    pub fn intel_adapter() -> Result<AdapterInfo> {
        query_adapter("| Where-Object { $_.Caption -like '*Intel*' } ")
    }

    pub fn engine_utilization(scope: EngineScope) -> Result<f64> {
        let script = match scope {
            EngineScope::All => "(Get-Counter '\\GPU Engine(*engtype_3D)\\Utilization Percentage' -ErrorAction SilentlyContinue).CounterSamples.CookedValue | Measure-Object -Sum | Select-Object -ExpandProperty Sum",
            EngineScope::Intel => "(Get-Counter '\\GPU Engine(*)\\Utilization Percentage' -ErrorAction SilentlyContinue).CounterSamples | Where-Object { $_.InstanceName -match 'intel' } | Select-Object -ExpandProperty CookedValue | Measure-Object -Sum | Select-Object -ExpandProperty Sum",
        };
        parse_counter_sum(&run_powershell(script, COUNTER_TIMEOUT)?)
    }

    pub fn dedicated_memory_used_mb() -> Result<f64> {
        let output = run_powershell(
            "(Get-Counter '\\GPU Adapter Memory(*)\\Dedicated Usage' -ErrorAction SilentlyContinue).CounterSamples.CookedValue | Measure-Object -Sum | Select-Object -ExpandProperty Sum",
            COUNTER_TIMEOUT,
        )?;
        Ok(parse_counter_sum(&output)? / BYTES_PER_MB)
    }

    pub fn thermal_zone_celsius() -> Result<f64> {
        let output = run_powershell(
            "Get-CimInstance -Namespace root/wmi -ClassName MSAcpi_ThermalZoneTemperature -ErrorAction SilentlyContinue | Select-Object -First 1 -ExpandProperty CurrentTemperature",
            COUNTER_TIMEOUT,
        )?;
        if output.is_empty() {
            return Err(SystemizerError::metric_collection("No ACPI thermal zone"));
        }
        Ok(tenths_kelvin_to_celsius(parse_counter_sum(&output)?))
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use std::path::Path;

    use super::sysfs::{self, DrmCard, INTEL_VENDOR_ID};
    use super::{millidegrees_to_celsius, AdapterInfo, EngineScope};
    use crate::core::metrics::BYTES_PER_MB;
    use crate::error::{Result, SystemizerError};

    const DRM_ROOT: &str = "/sys/class/drm";
    const THERMAL_ROOT: &str = "/sys/class/thermal";

    fn primary_card() -> Result<DrmCard> {
        sysfs::primary_card(Path::new(DRM_ROOT))
            .ok_or_else(|| SystemizerError::gpu_not_available("No DRM display adapter found"))
    }

    fn intel_card() -> Result<DrmCard> {
        sysfs::scan_cards(Path::new(DRM_ROOT))
            .into_iter()
            .find(|card| card.vendor_id == INTEL_VENDOR_ID)
            .ok_or_else(|| SystemizerError::intel_query("No Intel DRM adapter found"))
    }

    fn adapter_info(card: &DrmCard) -> AdapterInfo {
        AdapterInfo {
            name: card.display_name(),
            memory_mb: card.vram_total_bytes().unwrap_or(0) as f64 / BYTES_PER_MB,
        }
    }

    pub fn primary_adapter() -> Result<AdapterInfo> {
        primary_card().map(|card| adapter_info(&card))
    }

    pub fn intel_adapter() -> Result<AdapterInfo> {
        intel_card().map(|card| adapter_info(&card))
    }

    pub fn engine_utilization(scope: EngineScope) -> Result<f64> {
        let card = match scope {
            EngineScope::All => primary_card()?,
            EngineScope::Intel => intel_card()?,
        };
        // Drivers without gpu_busy_percent (i915, nouveau) read as idle
        Ok(card.busy_percent().unwrap_or(0) as f64)
    }

    pub fn dedicated_memory_used_mb() -> Result<f64> {
        let card = primary_card()?;
        Ok(card.vram_used_bytes().unwrap_or(0) as f64 / BYTES_PER_MB)
    }

    pub fn thermal_zone_celsius() -> Result<f64> {
        sysfs::acpi_thermal_millidegrees(Path::new(THERMAL_ROOT))
            .map(millidegrees_to_celsius)
            .ok_or_else(|| SystemizerError::metric_collection("No ACPI thermal zone"))
    }
}

#[cfg(not(any(windows, target_os = "linux")))]
mod unsupported {
    use super::{AdapterInfo, EngineScope};
    use crate::error::{Result, SystemizerError};

    fn unsupported<T>() -> Result<T> {
        Err(SystemizerError::gpu_not_available(
            "GPU queries not supported on this platform",
        ))
    }

    pub fn primary_adapter() -> Result<AdapterInfo> {
        unsupported()
    }

    pub fn intel_adapter() -> Result<AdapterInfo> {
        unsupported()
    }

    pub fn engine_utilization(_scope: EngineScope) -> Result<f64> {
        unsupported()
    }

    pub fn dedicated_memory_used_mb() -> Result<f64> {
        unsupported()
    }

    pub fn thermal_zone_celsius() -> Result<f64> {
        unsupported()
    }
}

/// Readers for the Linux DRM and thermal sysfs trees, rooted anywhere for testing.
#[cfg(any(target_os = "linux", test))]
pub mod sysfs {
    use std::fs;
    use std::path::{Path, PathBuf};

    pub const NVIDIA_VENDOR_ID: u16 = 0x10de;
    pub const AMD_VENDOR_ID: u16 = 0x1002;
    pub const INTEL_VENDOR_ID: u16 = 0x8086;

    #[derive(Debug, Clone)]
    pub struct DrmCard {
        pub device_dir: PathBuf,
        pub vendor_id: u16,
        pub device_id: u16,
        pub boot_vga: bool,
    }

    impl DrmCard {
        fn read(&self, file: &str) -> Option<String> {
            fs::read_to_string(self.device_dir.join(file))
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        }

        fn read_u64(&self, file: &str) -> Option<u64> {
            self.read(file)?.parse().ok()
        }

        /// Marketing name when the driver exposes one, else vendor + PCI ids.
        pub fn display_name(&self) -> String {
            self.read("product_name").unwrap_or_else(|| {
                format!(
                    "{} GPU [{:04x}:{:04x}]",
                    vendor_label(self.vendor_id),
                    self.vendor_id,
                    self.device_id
                )
            })
        }

        pub fn busy_percent(&self) -> Option<u64> {
            self.read_u64("gpu_busy_percent")
        }

        pub fn vram_total_bytes(&self) -> Option<u64> {
            self.read_u64("mem_info_vram_total")
        }

        pub fn vram_used_bytes(&self) -> Option<u64> {
            self.read_u64("mem_info_vram_used")
        }
    }

    pub fn vendor_label(vendor_id: u16) -> &'static str {
        match vendor_id {
            NVIDIA_VENDOR_ID => "NVIDIA",
            AMD_VENDOR_ID => "AMD",
            INTEL_VENDOR_ID => "Intel",
            _ => "Unknown",
        }
    }

    fn parse_hex_id(raw: &str) -> Option<u16> {
        u16::from_str_radix(raw.trim().trim_start_matches("0x"), 16).ok()
    }

    /// `cardN` entries (connectors like `card0-HDMI-A-1` are skipped), sorted by name.
    pub fn scan_cards(drm_root: &Path) -> Vec<DrmCard> {
        let Ok(entries) = fs::read_dir(drm_root) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| {
                name.strip_prefix("card")
                    .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
            })
            .collect();
        names.sort();

        names
            .into_iter()
            .filter_map(|name| {
                let device_dir = drm_root.join(name).join("device");
                let vendor_id = parse_hex_id(&fs::read_to_string(device_dir.join("vendor")).ok()?)?;
                let device_id = fs::read_to_string(device_dir.join("device"))
                    .ok()
                    .and_then(|raw| parse_hex_id(&raw))
                    .unwrap_or(0);
                let boot_vga = fs::read_to_string(device_dir.join("boot_vga"))
                    .map(|s| s.trim() == "1")
                    .unwrap_or(false);
                Some(DrmCard {
                    device_dir,
                    vendor_id,
                    device_id,
                    boot_vga,
                })
            })
            .collect()
    }

    /// The boot VGA device if flagged, else the first card.
    pub fn primary_card(drm_root: &Path) -> Option<DrmCard> {
        let cards = scan_cards(drm_root);
        cards
            .iter()
            .find(|card| card.boot_vga)
            .cloned()
            .or_else(|| cards.into_iter().next())
    }

    /// First `acpitz` zone's temperature in millidegrees Celsius.
    pub fn acpi_thermal_millidegrees(thermal_root: &Path) -> Option<f64> {
        let mut zones: Vec<PathBuf> = fs::read_dir(thermal_root)
            .ok()?
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with("thermal_zone"))
            })
            .collect();
        zones.sort();

        zones.into_iter().find_map(|zone| {
            let kind = fs::read_to_string(zone.join("type")).ok()?;
            if kind.trim() != "acpitz" {
                return None;
            }
            fs::read_to_string(zone.join("temp")).ok()?.trim().parse().ok()
        })
    }
}
