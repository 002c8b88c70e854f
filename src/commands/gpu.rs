use anyhow::{Context, Result};
use colored::Colorize;

use crate::core::GpuMetricsProvider;

/// Print the detected GPU and one stats sample as JSON
pub fn execute() -> Result<()> {
    let mut provider = GpuMetricsProvider::system();
    let info = provider.info();

    if !info.available {
        eprintln!("{}", "No usable GPU backend found".yellow());
    }

    let report = serde_json::json!({
        "info": info,
        "stats": provider.stats(),
    });

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize GPU report")?
    );
    Ok(())
}
