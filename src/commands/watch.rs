//! `watch`: stream collector snapshots as JSON lines until Ctrl+C.

use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ArgMatches;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Notify;

use crate::core::settings::{toggle_keys, Settings};
use crate::core::{
    CollectorConfig, GpuMetricsProvider, HostMetricsProvider, MetricKey, MetricSnapshot,
    StatEnablementRegistry, Tier, TieredCollector,
};

type TierReceiver = Option<broadcast::Receiver<MetricSnapshot>>;

/// Execute the watch command
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let interval_ms = matches.get_one::<u64>("interval-ms").copied().unwrap_or(1000);
    let once = matches.get_flag("once");

    let tiers = match matches.get_one::<String>("tiers") {
        Some(list) => parse_tiers(list)?,
        None => Tier::ALL.to_vec(),
    };

    let registry = Arc::new(StatEnablementRegistry::new());
    let settings = Settings::load().unwrap_or_else(|e| {
        log::warn!("Could not load settings, using defaults: {:#}", e);
        Settings::default()
    });
    settings.apply_to(&registry);

    if let Some(list) = matches.get_one::<String>("disable") {
        for key in parse_disabled(list)? {
            registry.set_enabled(key, false);
        }
    }

    let config = CollectorConfig {
        period: Duration::from_millis(interval_ms.max(1)),
        ..Default::default()
    };

    let mut collector = TieredCollector::with_sources(
        Box::new(HostMetricsProvider::new()),
        GpuMetricsProvider::system(),
        registry,
        config,
    );

    let subscribe = |tier: Tier| tiers.contains(&tier).then(|| collector.subscribe(tier));
    let mut fast = subscribe(Tier::Fast);
    let mut medium = subscribe(Tier::Medium);
    let mut slow = subscribe(Tier::Slow);
    let mut gpu = subscribe(Tier::Gpu);

    if once {
        collector.force_refresh_all();
        for rx in [&mut fast, &mut medium, &mut slow, &mut gpu].into_iter().flatten() {
            while let Ok(snapshot) = rx.try_recv() {
                if !print_snapshot(&snapshot)? {
                    return Ok(());
                }
            }
        }
        return Ok(());
    }

    let shutdown = Arc::new(Notify::new());
    let shutdown_signal = Arc::clone(&shutdown);
    ctrlc::set_handler(move || shutdown_signal.notify_one())
        .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

    collector.start().context("Failed to start metrics collector")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("Failed to build async runtime")?;

    let result = runtime.block_on(async {
        loop {
            let event = tokio::select! {
                _ = shutdown.notified() => break,
                event = next_event(&mut fast) => event,
                event = next_event(&mut medium) => event,
                event = next_event(&mut slow) => event,
                event = next_event(&mut gpu) => event,
            };

            match event {
                Ok(snapshot) => {
                    if !print_snapshot(&snapshot)? {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Output fell behind, {} snapshots dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    });

    collector.stop();
    result
}

async fn next_event(rx: &mut TierReceiver) -> Result<MetricSnapshot, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Returns false once stdout is gone (e.g. the pipe reader exited).
fn print_snapshot(snapshot: &MetricSnapshot) -> Result<bool> {
    let line = serde_json::to_string(snapshot).context("Failed to serialize snapshot")?;
    let mut stdout = std::io::stdout().lock();
    Ok(writeln!(stdout, "{}", line).and_then(|_| stdout.flush()).is_ok())
}

fn parse_tiers(list: &str) -> Result<Vec<Tier>> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| Tier::from_str(s).map_err(anyhow::Error::from))
        .collect()
}

/// Accepts settings toggle names ("ram") and metric key names ("ram_used").
fn parse_disabled(list: &str) -> Result<Vec<MetricKey>> {
    let mut keys = Vec::new();

    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match toggle_keys(name) {
            Some(toggle) => keys.extend_from_slice(toggle),
            None => keys.push(MetricKey::from_str(name)?),
        }
    }

    Ok(keys)
}
