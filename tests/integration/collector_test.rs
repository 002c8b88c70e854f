use std::collections::BTreeSet;
use std::thread;
use std::time::{Duration, Instant};

use systemizer::core::{CollectorConfig, CollectorState, MetricKey, MetricValue, Tier};
use systemizer::SystemizerError;

use super::support::{drain, harness, harness_with, GpuState};

#[test]
fn test_tier_schedule_over_thirty_one_ticks() {
    let h = harness(GpuState::nvidia());
    let mut fast = h.collector.subscribe(Tier::Fast);
    let mut medium = h.collector.subscribe(Tier::Medium);
    let mut slow = h.collector.subscribe(Tier::Slow);
    let mut gpu = h.collector.subscribe(Tier::Gpu);

    for tick in 0..=30 {
        h.collector.sample_tick(tick);
    }

    assert_eq!(drain(&mut fast).len(), 31);
    assert_eq!(drain(&mut medium).len(), 7);
    assert_eq!(drain(&mut slow).len(), 2);
    assert_eq!(drain(&mut gpu).len(), 31);
}

#[test]
fn test_disabled_ram_keys_absent_from_fast_tier() {
    let h = harness(GpuState::nvidia());
    for key in Tier::Fast.keys() {
        if key.as_str().starts_with("ram_") {
            h.collector.set_metric_enabled(key, false);
        }
    }
    let mut fast = h.collector.subscribe(Tier::Fast);

    h.collector.sample_tick(1);

    let snapshot = drain(&mut fast).pop().unwrap();
    assert_eq!(snapshot.get(MetricKey::CpuUsage), Some(&MetricValue::Float(42.0)));
    assert!(snapshot.keys().all(|key| !key.as_str().starts_with("ram_")));
    assert!(snapshot.contains(MetricKey::NetDownSpeed));
}

#[test]
fn test_toggle_takes_effect_next_tick() {
    let h = harness(GpuState::nvidia());
    let mut fast = h.collector.subscribe(Tier::Fast);

    h.collector.sample_tick(1);
    h.collector.set_metric_enabled(MetricKey::CpuCores, false);
    h.collector.sample_tick(2);

    let events = drain(&mut fast);
    assert!(events[0].contains(MetricKey::CpuCores));
    assert!(!events[1].contains(MetricKey::CpuCores));
}

#[test]
fn test_network_throughput_in_kb_per_second() {
    let h = harness(GpuState::nvidia());
    let mut fast = h.collector.subscribe(Tier::Fast);

    h.host.lock().net.bytes_recv = 1_001_024;
    h.clock.advance(Duration::from_secs(1));
    h.collector.sample_tick(1);

    let snapshot = drain(&mut fast).pop().unwrap();
    assert_eq!(snapshot.get_f64(MetricKey::NetDownSpeed), Some(1.0));
    assert_eq!(snapshot.get_f64(MetricKey::NetUpSpeed), Some(0.0));
}

#[test]
fn test_long_tick_rate_uses_elapsed_time() {
    let h = harness_with(
        GpuState::nvidia(),
        CollectorConfig {
            period: Duration::from_millis(100),
            channel_capacity: 1024,
            ..Default::default()
        },
    );
    let mut fast = h.collector.subscribe(Tier::Fast);

    // Each iteration takes 300 ms against a 100 ms period and moves 1 KB
    for tick in 1..=3 {
        h.host.lock().net.bytes_recv += 1024;
        h.clock.advance(Duration::from_millis(300));
        h.collector.sample_tick(tick);
    }

    for snapshot in drain(&mut fast) {
        let rate = snapshot.get_f64(MetricKey::NetDownSpeed).unwrap();
        assert!((rate - 1.0 / 0.3).abs() < 1e-9, "rate {rate}");
    }
}

#[test]
fn test_no_elapsed_time_reads_zero_rate() {
    let h = harness(GpuState::nvidia());
    let mut fast = h.collector.subscribe(Tier::Fast);

    h.host.lock().net.bytes_recv += 4096;
    h.collector.sample_tick(1);

    let snapshot = drain(&mut fast).pop().unwrap();
    assert_eq!(snapshot.get_f64(MetricKey::NetDownSpeed), Some(0.0));
}

#[test]
fn test_forced_refresh_splits_the_rate_window() {
    let h = harness(GpuState::nvidia());
    let mut fast = h.collector.subscribe(Tier::Fast);

    h.host.lock().net.bytes_recv += 1024;
    h.clock.advance(Duration::from_millis(500));
    h.collector.force_refresh_all();

    h.host.lock().net.bytes_recv += 1024;
    h.clock.advance(Duration::from_millis(500));
    h.collector.sample_tick(1);

    let rates: Vec<_> = drain(&mut fast)
        .iter()
        .map(|s| s.get_f64(MetricKey::NetDownSpeed).unwrap())
        .collect();
    assert_eq!(rates, vec![2.0, 2.0]);
}

#[test]
fn test_force_refresh_after_stop_is_silent() {
    let mut h = harness(GpuState::nvidia());
    let mut receivers: Vec<_> = Tier::ALL.iter().map(|t| h.collector.subscribe(*t)).collect();

    h.collector.stop();
    h.collector.force_refresh_all();

    for rx in receivers.iter_mut() {
        assert!(drain(rx).is_empty());
    }
}

#[test]
fn test_counter_reset_clamps_to_zero() {
    let h = harness(GpuState::nvidia());
    let mut fast = h.collector.subscribe(Tier::Fast);

    h.host.lock().net.bytes_recv = 10;
    h.clock.advance(Duration::from_secs(1));
    h.collector.sample_tick(1);

    let snapshot = drain(&mut fast).pop().unwrap();
    assert_eq!(snapshot.get_f64(MetricKey::NetDownSpeed), Some(0.0));
}

#[test]
fn test_force_refresh_all_emits_every_tier_with_stable_keys() {
    let h = harness(GpuState::nvidia());
    let mut receivers: Vec<_> = Tier::ALL.iter().map(|t| h.collector.subscribe(*t)).collect();

    h.collector.force_refresh_all();
    h.collector.force_refresh_all();

    for rx in receivers.iter_mut() {
        let events = drain(rx);
        assert_eq!(events.len(), 2);
        let first: BTreeSet<_> = events[0].keys().collect();
        let second: BTreeSet<_> = events[1].keys().collect();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}

#[test]
fn test_slow_tier_uptime_split() {
    let h = harness(GpuState::nvidia());
    let mut slow = h.collector.subscribe(Tier::Slow);

    h.collector.sample_tick(0);

    let snapshot = drain(&mut slow).pop().unwrap();
    // 7500 s = 2 h 5 min
    assert_eq!(snapshot.get(MetricKey::UptimeHours), Some(&MetricValue::Count(2)));
    assert_eq!(snapshot.get(MetricKey::UptimeMinutes), Some(&MetricValue::Count(5)));
    assert_eq!(snapshot.get_f64(MetricKey::DiskPercent), Some(71.0));
}

#[test]
fn test_gpu_snapshot_values_and_units() {
    let h = harness(GpuState::nvidia());
    let mut gpu = h.collector.subscribe(Tier::Gpu);

    h.collector.sample_tick(3);

    let snapshot = drain(&mut gpu).pop().unwrap();
    assert_eq!(snapshot.available, Some(true));
    assert_eq!(snapshot.get_f64(MetricKey::GpuUsage), Some(35.0));
    assert_eq!(snapshot.get_f64(MetricKey::VramUsed), Some(3.0));
    assert_eq!(snapshot.get_f64(MetricKey::VramTotal), Some(12.0));
    assert_eq!(snapshot.get_f64(MetricKey::VramPercent), Some(25.0));
}

#[test]
fn test_gpu_tier_silent_when_every_gpu_key_disabled() {
    let h = harness(GpuState::nvidia());
    for key in Tier::Gpu.keys() {
        h.collector.set_metric_enabled(key, false);
    }
    let mut gpu = h.collector.subscribe(Tier::Gpu);

    for tick in 0..5 {
        h.collector.sample_tick(tick);
    }

    assert!(drain(&mut gpu).is_empty());
}

#[test]
fn test_gpu_appears_at_reprobe_tick() {
    let h = harness(GpuState::absent());
    let mut gpu = h.collector.subscribe(Tier::Gpu);
    assert!(!h.collector.gpu_info().available);

    h.collector.sample_tick(0);
    let first = drain(&mut gpu);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].available, Some(false));
    assert!(first[0].is_empty());

    *h.gpu.lock() = GpuState::nvidia();

    for tick in 1..300 {
        h.collector.sample_tick(tick);
    }
    assert!(drain(&mut gpu).is_empty());

    h.collector.sample_tick(300);
    let events = drain(&mut gpu);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].available, Some(true));
    assert!(events[0].contains(MetricKey::GpuUsage));
    assert!(h.collector.gpu_info().available);
}

#[test]
fn test_gpu_failure_mid_run_degrades_then_recovers() {
    let h = harness(GpuState::nvidia());
    let mut gpu = h.collector.subscribe(Tier::Gpu);

    for tick in 0..250 {
        h.collector.sample_tick(tick);
    }
    let healthy = drain(&mut gpu);
    assert_eq!(healthy.len(), 250);
    assert!(healthy.iter().all(|s| s.available == Some(true)));

    h.gpu.lock().fail_stats = true;
    h.collector.sample_tick(250);
    let failed = drain(&mut gpu);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].available, Some(false));

    h.gpu.lock().fail_stats = false;
    for tick in 251..300 {
        h.collector.sample_tick(tick);
    }
    assert!(drain(&mut gpu).is_empty());

    h.collector.sample_tick(300);
    let recovered = drain(&mut gpu);
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].available, Some(true));
}

#[test]
fn test_vendor_library_missing_falls_back_to_generic() {
    let mut state = GpuState::nvidia();
    state.vendor_library = false;
    let h = harness(state);

    let info = h.collector.gpu_info();
    assert!(info.available);
    assert_eq!(info.vendor, systemizer::core::GpuVendor::Generic);
    assert_eq!(info.name, "Nvidia GeForce RTX 4070");
}

#[test]
fn test_start_stop_lifecycle() {
    let mut h = harness_with(
        GpuState::nvidia(),
        CollectorConfig {
            period: Duration::from_millis(5),
            channel_capacity: 1024,
            ..Default::default()
        },
    );
    let mut medium = h.collector.subscribe(Tier::Medium);

    assert_eq!(h.collector.state(), CollectorState::Idle);
    h.collector.start().unwrap();
    assert!(matches!(h.collector.start(), Err(SystemizerError::AlreadyStarted)));

    // Tick 0 always fires the medium tier
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut got = false;
    while !got && Instant::now() < deadline {
        got = medium.try_recv().is_ok();
        if !got {
            thread::sleep(Duration::from_millis(5));
        }
    }
    assert!(got);

    h.collector.stop();
    assert_eq!(h.collector.state(), CollectorState::Stopped);
    h.collector.stop();
    assert_eq!(h.collector.state(), CollectorState::Stopped);
}

#[test]
fn test_stop_before_start_is_terminal() {
    let mut h = harness(GpuState::absent());
    h.collector.stop();
    assert!(matches!(h.collector.start(), Err(SystemizerError::AlreadyStarted)));
}
