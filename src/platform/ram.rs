//! RAM clock speed lookup.

use regex::Regex;

use super::command::QUERY_TIMEOUT;

/// Returned when the query ran but reported nothing usable.
pub const RAM_SPEED_UNKNOWN: &str = "Unknown";

/// Returned when the query itself could not be run.
pub const RAM_SPEED_NOT_AVAILABLE: &str = "N/A";

/// Clock speed of the first memory module, e.g. `"3200 MHz"`.
///
/// Never fails: query errors map to [`RAM_SPEED_NOT_AVAILABLE`], unparseable
/// output to [`RAM_SPEED_UNKNOWN`].
pub fn fetch_ram_speed() -> String {
    match query_ram_speed() {
        Ok(Some(mhz)) => {
            log::info!("Detected RAM speed: {} MHz", mhz);
            format_ram_speed(mhz)
        }
        Ok(None) => {
            log::warn!("Could not determine RAM speed from query output");
            RAM_SPEED_UNKNOWN.to_string()
        }
        Err(e) => {
            log::warn!("Failed to query RAM speed: {}", e);
            RAM_SPEED_NOT_AVAILABLE.to_string()
        }
    }
}

pub fn format_ram_speed(mhz: u32) -> String {
    format!("{} MHz", mhz)
}

#[cfg(windows)]
fn query_ram_speed() -> crate::error::Result<Option<u32>> {
    let output = super::command::run_powershell(
        "Get-CimInstance -ClassName Win32_PhysicalMemory | Select-Object -ExpandProperty Speed",
        QUERY_TIMEOUT,
    )?;
    Ok(parse_speed_lines(&output))
}

#[cfg(target_os = "linux")]
fn query_ram_speed() -> crate::error::Result<Option<u32>> {
    // dmidecode needs root; without it the call fails and we report N/A
    let output = super::command::run_command("dmidecode", &["-t", "memory"], QUERY_TIMEOUT)?;
    Ok(parse_dmidecode_speed(&output))
}

#[cfg(not(any(windows, target_os = "linux")))]
fn query_ram_speed() -> crate::error::Result<Option<u32>> {
    let _ = QUERY_TIMEOUT;
    Err(crate::error::SystemizerError::metric_collection(
        "RAM speed query not supported on this platform",
    ))
}

/// First line that is a bare positive integer (one line per module).
pub fn parse_speed_lines(output: &str) -> Option<u32> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|line| line.parse::<u32>().ok())
        .find(|speed| *speed > 0)
}

/// First `Speed: N MT/s` (or MHz) entry from `dmidecode -t memory`.
pub fn parse_dmidecode_speed(output: &str) -> Option<u32> {
    let re = Regex::new(r"(?m)^\s*(?:Configured (?:Memory|Clock) )?Speed:\s*(\d+)\s*(?:MT/s|MHz)").ok()?;
    let speed = re
        .captures_iter(output)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .find(|speed| *speed > 0);
    speed
}
