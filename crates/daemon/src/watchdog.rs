// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watchdog: restart the daemon when its PID file is gone or stale.
//!
//! Runs as a short-lived external process (cron or a systemd timer).
//! Idempotent when the daemon is healthy.

use chrono::Local;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use tm_core::Settings;

/// What one watchdog pass found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchdogOutcome {
    /// The daemon is alive; nothing to do.
    Healthy { pid: u32 },
    /// The daemon was missing and has been restarted.
    Restarted { via: RestartMethod },
    /// The daemon was missing and the restart attempt failed.
    RestartFailed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartMethod {
    Systemd,
    Direct,
}

/// Read the PID file and probe for life.
pub fn daemon_pid(settings: &Settings) -> Option<u32> {
    let content = std::fs::read_to_string(settings.pid_path()).ok()?;
    let pid: u32 = content.trim().parse().ok()?;
    let raw = i32::try_from(pid).ok()?;
    kill(Pid::from_raw(raw), None).is_ok().then_some(pid)
}

/// One watchdog pass: probe, restart if needed, log the result.
pub fn run_once(settings: &Settings) -> WatchdogOutcome {
    let outcome = match daemon_pid(settings) {
        Some(pid) => WatchdogOutcome::Healthy { pid },
        None => restart(settings),
    };
    log_outcome(settings, &outcome);
    outcome
}

fn restart(settings: &Settings) -> WatchdogOutcome {
    // Prefer the init system when it knows the service; fall back to a
    // direct detached spawn and record the new PID.
    if systemctl_available() {
        let status = Command::new("systemctl")
            .args(["start", "tmserviced"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if matches!(status, Ok(s) if s.success()) {
            return WatchdogOutcome::Restarted { via: RestartMethod::Systemd };
        }
    }

    let daemon = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|d| d.join("tmserviced")))
        .filter(|p| p.is_file())
        .unwrap_or_else(|| "tmserviced".into());
    match Command::new(&daemon)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => {
            // The daemon rewrites its own PID file under the lock; this is
            // only a hint until it does.
            let _ = std::fs::write(settings.pid_path(), format!("{}\n", child.id()));
            WatchdogOutcome::Restarted { via: RestartMethod::Direct }
        }
        Err(e) => WatchdogOutcome::RestartFailed { reason: e.to_string() },
    }
}

fn systemctl_available() -> bool {
    Command::new("systemctl")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn log_outcome(settings: &Settings, outcome: &WatchdogOutcome) {
    let line = match outcome {
        WatchdogOutcome::Healthy { pid } => format!("daemon healthy (pid {pid})"),
        WatchdogOutcome::Restarted { via: RestartMethod::Systemd } => {
            "daemon absent, restarted via systemd".to_string()
        }
        WatchdogOutcome::Restarted { via: RestartMethod::Direct } => {
            "daemon absent, restarted directly".to_string()
        }
        WatchdogOutcome::RestartFailed { reason } => {
            format!("daemon absent, restart failed: {reason}")
        }
    };
    append_log(&settings.log_dir, &line);
}

fn append_log(log_dir: &Path, line: &str) {
    let _ = std::fs::create_dir_all(log_dir);
    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("watchdog.log"))
    {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let _ = writeln!(file, "[{stamp}] {line}");
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
