// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-host advisory PID locks under the run directory.

use crate::logs::pid_alive;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors from lock acquisition
#[derive(Debug, Error)]
pub enum LockError {
    #[error("backup for {hostname} already running (pid {pid})")]
    Conflict { hostname: String, pid: u32 },
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Held advisory lock for one host. Released on drop, on every exit path.
#[derive(Debug)]
pub struct HostLock {
    path: PathBuf,
}

impl HostLock {
    /// Acquire the lock for `hostname`, cleaning up a stale lock whose PID
    /// is dead. A live PID is a conflict — the job is already running.
    pub fn acquire(run_dir: &Path, hostname: &str, pid: u32) -> Result<Self, LockError> {
        let path = run_dir.join(format!("{hostname}.pid"));
        let io = |source| LockError::Io { path: path.clone(), source };
        std::fs::create_dir_all(run_dir).map_err(io)?;

        if let Ok(content) = std::fs::read_to_string(&path) {
            let holder: u32 = content.trim().parse().unwrap_or(0);
            if holder != 0 && pid_alive(holder) {
                return Err(LockError::Conflict { hostname: hostname.to_string(), pid: holder });
            }
            warn!(hostname, stale_pid = holder, "removing stale host lock");
            std::fs::remove_file(&path).map_err(io)?;
        }

        std::fs::write(&path, format!("{pid}\n")).map_err(io)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for HostLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to release host lock");
            }
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
