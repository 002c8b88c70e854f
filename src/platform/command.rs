//! Shell-out helpers with a bounded wait.
//!
//! Vendor and RAM queries go through here so a hung tool costs at most one
//! timeout per call instead of stalling the metrics worker forever.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;

use crate::error::{Result, SystemizerError};

/// Timeout for one-off hardware queries (adapter name, RAM modules).
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for per-tick performance counter reads.
pub const COUNTER_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Run a program and return its stdout, killing it once `timeout` elapses.
pub fn run_command(program: &str, args: &[&str], timeout: Duration) -> Result<String> {
    let display = format!("{} {}", program, args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| SystemizerError::command_failed(&display, e.to_string()))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| SystemizerError::command_failed(&display, "stdout not captured"))?;

    // Drain stdout on a side thread so a chatty child can't fill the pipe and block
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        buf
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SystemizerError::CommandTimeout {
                    command: display,
                    secs: timeout.as_secs(),
                });
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    };

    let buf = reader.join().unwrap_or_default();

    if !status.success() {
        return Err(SystemizerError::command_failed(
            display,
            format!("exited with {}", status),
        ));
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Run a PowerShell script and return its trimmed stdout.
pub fn run_powershell(script: &str, timeout: Duration) -> Result<String> {
    let output = run_command(
        "powershell",
        &["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", script],
        timeout,
    )?;
    Ok(output.trim().to_string())
}

pub fn run_powershell_json<T: DeserializeOwned>(script: &str, timeout: Duration) -> Result<T> {
    let stdout = run_powershell(script, timeout)?;

    if stdout.is_empty() {
        return Err(SystemizerError::command_failed(script, "no output"));
    }

    serde_json::from_str(&stdout).map_err(|e| {
        SystemizerError::command_failed(script, format!("JSON parsing failed: {e}. Output: {stdout}"))
    })
}

/// `ConvertTo-Json` emits a bare object for one row and an array for many.
pub fn one_or_many<T: DeserializeOwned>(value: serde_json::Value) -> Result<Vec<T>> {
    match value {
        serde_json::Value::Array(arr) => Ok(serde_json::from_value(serde_json::Value::Array(arr))?),
        value => Ok(vec![serde_json::from_value(value)?]),
    }
}

/// Parse the numeric output of `... | Measure-Object -Sum | Select -ExpandProperty Sum`.
///
/// PowerShell prints nothing when no counter instance matched; that reads as zero.
pub fn parse_counter_sum(output: &str) -> Result<f64> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|e| SystemizerError::metric_collection(format!("Bad counter value {trimmed:?}: {e}")))
}
