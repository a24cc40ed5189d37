// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job log files and log-tail inspection.
//!
//! A job that dies with the daemon leaves a `running` record behind; the
//! tail of its log is the only evidence of how it ended. Observers use
//! [`infer_status`] to settle such records.

use chrono::Local;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::io::Write;
use std::path::{Path, PathBuf};
use tm_core::JobStatus;

/// Markers that classify a dead job's log tail as a failure.
pub const FAILURE_MARKERS: &[&str] =
    &["[ERROR]", "FAIL", "fatal", "Permission denied", "cannot create"];

/// How many tail lines inspection and failure notifications consider.
pub const TAIL_LINES: usize = 500;

/// Whether a PID refers to a live process.
pub fn pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    kill(Pid::from_raw(pid), None).is_ok()
}

/// Last `limit` lines of a file. Missing files read as empty.
pub fn tail_lines(path: &Path, limit: usize) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(limit);
    lines[start..].iter().map(|s| s.to_string()).collect()
}

/// Settle a dead job from its log tail: error markers mean failed,
/// anything else means it completed before the record could be updated.
pub fn infer_status(log_path: &Path) -> JobStatus {
    let tail = tail_lines(log_path, TAIL_LINES);
    let failed = tail
        .iter()
        .any(|line| FAILURE_MARKERS.iter().any(|marker| line.contains(marker)));
    if failed {
        JobStatus::Failed
    } else {
        JobStatus::Completed
    }
}

/// Append-only, timestamped job log (`backup-<host>-<ts>.log`).
///
/// Written synchronously: each line must be on disk before the phase it
/// describes starts, or post-mortem inspection lies.
#[derive(Debug)]
pub struct JobLog {
    path: PathBuf,
    file: std::fs::File,
}

impl JobLog {
    pub fn create(path: PathBuf) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&mut self, message: &str) {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let _ = writeln!(self.file, "[{stamp}] {message}");
    }

    pub fn error(&mut self, message: &str) {
        self.line(&format!("[ERROR] {message}"));
    }
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
