use std::fs;

use tempfile::TempDir;

use systemizer::core::settings::{Settings, TOGGLES};
use systemizer::core::{MetricKey, StatEnablementRegistry, Tier};

use super::support::{drain, harness, GpuState};

#[test]
fn test_settings_roundtrip_through_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("systemizer").join("settings.json");

    let mut settings = Settings::load_from(&path).unwrap();
    settings.set_toggle("processes", false).unwrap();
    settings.set_background("Pure Black").unwrap();
    settings.save_to(&path).unwrap();

    let reloaded = Settings::load_from(&path).unwrap();
    assert!(!reloaded.is_toggle_enabled("processes"));
    assert_eq!(reloaded.background_main(), "#0d0d0d");
    assert_eq!(reloaded.statistics.len(), TOGGLES.len());
}

#[test]
fn test_stored_file_uses_toggle_names() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");

    Settings::default().save_to(&path).unwrap();
    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

    assert_eq!(raw["statistics"]["net_down"], serde_json::Value::Bool(true));
    assert_eq!(raw["theme"]["background_main"], "#1e1e2e");
}

#[test]
fn test_applied_settings_gate_collector_output() {
    let h = harness(GpuState::nvidia());

    let mut settings = Settings::default();
    settings.set_toggle("processes", false).unwrap();
    settings.apply_to(h.collector.registry());

    let mut medium = h.collector.subscribe(Tier::Medium);
    h.collector.sample_tick(0);

    // Process count is the only medium key, so the tier goes quiet
    assert!(drain(&mut medium).is_empty());
}

#[test]
fn test_apply_to_reenables() {
    let registry = StatEnablementRegistry::new();
    registry.set_enabled(MetricKey::GpuTemp, false);

    Settings::default().apply_to(&registry);
    assert!(registry.is_enabled(MetricKey::GpuTemp));
}
