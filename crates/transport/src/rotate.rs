// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention rotation: delete snapshots older than the retention window.
//!
//! The cutoff compares only the ten-character date key, so a daily snapshot
//! and its same-day timestamped siblings rotate together. Errors here are
//! logged and skipped — rotation never fails a backup that already
//! succeeded.

use crate::error::TransportError;
use crate::snapshots::{self, LATEST};
use chrono::{Days, NaiveDate};
use std::path::Path;
use tracing::{info, warn};

/// Delete snapshot directories whose date precedes `today - retention_days`.
/// Returns the names of the directories that were removed.
pub fn rotate(
    host_root: &Path,
    retention_days: u32,
    today: NaiveDate,
) -> Result<Vec<String>, TransportError> {
    let Some(cutoff) = today.checked_sub_days(Days::new(retention_days as u64)) else {
        return Ok(Vec::new());
    };
    let mut removed = Vec::new();
    for snapshot in snapshots::list_snapshots(host_root)? {
        if snapshot.date() >= cutoff {
            continue;
        }
        let dir = host_root.join(snapshot.dir_name());
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!(path = %dir.display(), "rotated out expired snapshot");
                removed.push(snapshot.dir_name());
            }
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to remove expired snapshot");
            }
        }
    }
    clean_stale_links(host_root);
    Ok(removed)
}

/// Remove symbolic references whose target no longer exists (rotation can
/// orphan the legacy `daily-latest` link, and `latest` itself after a manual
/// cleanup).
fn clean_stale_links(host_root: &Path) {
    let Ok(read_dir) = std::fs::read_dir(host_root) else {
        return;
    };
    for dirent in read_dir.flatten() {
        let path = dirent.path();
        let is_symlink = path.symlink_metadata().map(|m| m.is_symlink()).unwrap_or(false);
        if !is_symlink || path.exists() {
            continue;
        }
        let name = dirent.file_name().to_string_lossy().into_owned();
        if name == LATEST || name.starts_with("daily") {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove stale link");
            }
        }
    }
}

#[cfg(test)]
#[path = "rotate_tests.rs"]
mod tests;
