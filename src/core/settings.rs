use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::metrics::MetricKey;
use super::registry::StatEnablementRegistry;

/// Settings-dialog toggles and the metric keys each one gates.
pub const TOGGLES: &[(&str, &[MetricKey])] = &[
    ("cpu", &[MetricKey::CpuUsage]),
    ("cpu_cores", &[MetricKey::CpuCores]),
    ("ram", &[MetricKey::RamPercent, MetricKey::RamUsed, MetricKey::RamTotal]),
    ("ram_speed", &[MetricKey::RamSpeed]),
    ("gpu", &[MetricKey::GpuUsage]),
    ("vram", &[MetricKey::VramUsed, MetricKey::VramTotal, MetricKey::VramPercent]),
    ("gpu_temp", &[MetricKey::GpuTemp]),
    ("gpu_power", &[MetricKey::GpuPower]),
    ("gpu_fan", &[MetricKey::GpuFan]),
    ("gpu_clock", &[MetricKey::GpuClock]),
    ("disk", &[MetricKey::DiskPercent]),
    ("net_down", &[MetricKey::NetDownSpeed]),
    ("net_up", &[MetricKey::NetUpSpeed]),
    ("processes", &[MetricKey::ProcessCount]),
    ("uptime", &[MetricKey::UptimeHours, MetricKey::UptimeMinutes]),
];

/// Named main-window backgrounds offered by the settings dialog
pub const BACKGROUND_COLORS: &[(&str, &str)] = &[
    ("Catppuccin", "#1e1e2e"),
    ("Pure Black", "#0d0d0d"),
    ("Dark Gray", "#2a2a2a"),
    ("Dark Blue", "#1a2a3a"),
    ("Dark Green", "#1a3a1a"),
    ("Dark Purple", "#2a1a3a"),
];

pub const DEFAULT_BACKGROUND: &str = "#1e1e2e";

pub fn toggle_keys(toggle: &str) -> Option<&'static [MetricKey]> {
    TOGGLES
        .iter()
        .find(|(name, _)| *name == toggle)
        .map(|(_, keys)| *keys)
}

fn default_statistics() -> BTreeMap<String, bool> {
    TOGGLES
        .iter()
        .map(|(name, _)| (name.to_string(), true))
        .collect()
}

fn default_background() -> String {
    DEFAULT_BACKGROUND.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default = "default_background")]
    pub background_main: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background_main: default_background(),
        }
    }
}

/// User preferences persisted as `settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_statistics")]
    pub statistics: BTreeMap<String, bool>,
    #[serde(default)]
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            statistics: default_statistics(),
            theme: Theme::default(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_settings_path()?)
    }

    /// Read settings from `path`.
    ///
    /// A missing file is created with defaults. A corrupt file is replaced by
    /// defaults. Stored toggles are merged over the defaults, so toggles added
    /// later always appear.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let settings = Settings::default();
            settings.save_to(path)?;
            return Ok(settings);
        }

        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {:?}", path))?;

        match serde_json::from_str::<Settings>(&data) {
            Ok(stored) => {
                log::info!("Settings loaded from {:?}", path);
                Ok(Self::merged(stored))
            }
            Err(e) => {
                log::error!("Corrupt settings file {:?}: {}. Reverting to defaults", path, e);
                let settings = Settings::default();
                settings.save_to(path)?;
                Ok(settings)
            }
        }
    }

    fn merged(stored: Settings) -> Self {
        let mut settings = Settings {
            theme: stored.theme,
            ..Settings::default()
        };

        for (name, enabled) in stored.statistics {
            if toggle_keys(&name).is_some() {
                settings.statistics.insert(name, enabled);
            } else {
                log::warn!("Ignoring unknown statistic toggle '{}'", name);
            }
        }

        settings
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory: {:?}", parent))?;
        }

        let data =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize settings")?;

        fs::write(path, data)
            .with_context(|| format!("Failed to write settings file: {:?}", path))?;

        log::debug!("Settings saved to {:?}", path);
        Ok(())
    }

    pub fn get_settings_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("systemizer").join("settings.json"))
    }

    /// Unknown toggles read as enabled.
    pub fn is_toggle_enabled(&self, toggle: &str) -> bool {
        self.statistics.get(toggle).copied().unwrap_or(true)
    }

    pub fn set_toggle(&mut self, toggle: &str, enabled: bool) -> Result<()> {
        if toggle_keys(toggle).is_none() {
            bail!(
                "Unknown statistic '{}'. Valid names: {}",
                toggle,
                TOGGLES.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(", ")
            );
        }
        self.statistics.insert(toggle.to_string(), enabled);
        Ok(())
    }

    /// Push every toggle into the registry.
    pub fn apply_to(&self, registry: &StatEnablementRegistry) {
        let updates = TOGGLES.iter().flat_map(|(name, keys)| {
            let enabled = self.is_toggle_enabled(name);
            keys.iter().map(move |key| (*key, enabled))
        });
        registry.set_many(updates);
    }

    pub fn background_main(&self) -> &str {
        &self.theme.background_main
    }

    /// Accepts a palette name ("Dark Blue") or a `#rrggbb` colour.
    pub fn set_background(&mut self, value: &str) -> Result<()> {
        let value = value.trim();

        if let Some((_, hex)) = BACKGROUND_COLORS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(value))
        {
            self.theme.background_main = hex.to_string();
            return Ok(());
        }

        let is_hex = value.len() == 7
            && value.starts_with('#')
            && value[1..].chars().all(|c| c.is_ascii_hexdigit());
        if !is_hex {
            bail!("Invalid background colour '{}'", value);
        }

        self.theme.background_main = value.to_lowercase();
        Ok(())
    }
}
