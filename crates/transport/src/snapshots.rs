// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot tree operations under one host root: listing, allocation,
//! the `latest` reference, and SQL dump placement.

use crate::error::TransportError;
use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tm_core::SnapshotId;
use walkdir::WalkDir;

/// Name of the symbolic reference to the newest successful snapshot.
pub const LATEST: &str = "latest";

/// All snapshot directories under a host root, oldest first.
pub fn list_snapshots(host_root: &Path) -> Result<Vec<SnapshotId>, TransportError> {
    let mut snapshots = Vec::new();
    let read_dir = match std::fs::read_dir(host_root) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(snapshots),
        Err(e) => return Err(TransportError::io(host_root, e)),
    };
    for dirent in read_dir.flatten() {
        if !dirent.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        if let Ok(id) = dirent.file_name().to_string_lossy().parse::<SnapshotId>() {
            snapshots.push(id);
        }
    }
    snapshots.sort();
    Ok(snapshots)
}

/// Count of unique snapshot dates. `2026-02-01` and `2026-02-01_140000`
/// count once; rotation deletes them together (see [`SnapshotId::date_key`]).
pub fn unique_date_count(host_root: &Path) -> Result<usize, TransportError> {
    let dates: BTreeSet<String> =
        list_snapshots(host_root)?.iter().map(|s| s.date_key()).collect();
    Ok(dates.len())
}

/// Resolve `latest` to the snapshot directory it points at, if it exists.
pub fn resolve_latest(host_root: &Path) -> Result<Option<PathBuf>, TransportError> {
    let link = host_root.join(LATEST);
    let target = match std::fs::read_link(&link) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(TransportError::io(&link, e)),
    };
    let resolved = if target.is_absolute() { target } else { host_root.join(target) };
    Ok(resolved.is_dir().then_some(resolved))
}

/// Atomically point `latest` at a snapshot (symlink to a temp name, rename).
pub fn swing_latest(host_root: &Path, snapshot: &SnapshotId) -> Result<(), TransportError> {
    let link = host_root.join(LATEST);
    let tmp = host_root.join(".latest.tmp");
    let _ = std::fs::remove_file(&tmp);
    #[cfg(unix)]
    std::os::unix::fs::symlink(snapshot.dir_name(), &tmp)
        .map_err(|e| TransportError::io(&tmp, e))?;
    std::fs::rename(&tmp, &link).map_err(|e| TransportError::io(&link, e))?;
    Ok(())
}

/// Allocate a snapshot id for a file sync: the daily name, or a timestamped
/// name when today's daily snapshot already holds a file tree.
pub fn allocate_snapshot(
    host_root: &Path,
    now: NaiveDateTime,
) -> Result<SnapshotId, TransportError> {
    let daily = SnapshotId::daily(now.date());
    let daily_files = host_root.join(daily.dir_name()).join("files");
    if daily_files.is_dir() {
        return Ok(SnapshotId::timestamped(now));
    }
    Ok(daily)
}

/// Where a SQL sync should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTarget {
    pub snapshot: SnapshotId,
    /// `sql/` for the first dump of a snapshot, `sql/<HHMMSS>/` afterwards.
    pub sql_dir: PathBuf,
}

/// Pick the snapshot a SQL sync writes into.
///
/// Prefers the snapshot this run's file sync produced; otherwise today's
/// newest snapshot, so interval runs do not inflate the version count;
/// otherwise a fresh daily snapshot. A snapshot that already has a populated
/// `sql/` gets a nested `sql/<HHMMSS>/`.
pub fn choose_sql_target(
    host_root: &Path,
    run_snapshot: Option<&SnapshotId>,
    now: NaiveDateTime,
) -> Result<SqlTarget, TransportError> {
    let snapshot = match run_snapshot {
        Some(id) => id.clone(),
        None => {
            let today = now.date();
            list_snapshots(host_root)?
                .into_iter()
                .filter(|s| s.date() == today)
                .next_back()
                .unwrap_or_else(|| SnapshotId::daily(today))
        }
    };
    let base = host_root.join(snapshot.dir_name()).join("sql");
    let populated = std::fs::read_dir(&base)
        .map(|mut rd| rd.next().is_some())
        .unwrap_or(false);
    let sql_dir = if populated {
        base.join(now.time().format("%H%M%S").to_string())
    } else {
        base
    };
    Ok(SqlTarget { snapshot, sql_dir })
}

/// Recursive byte size of a snapshot (or any directory).
pub fn tree_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.metadata().ok())
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
        .sum()
}

#[cfg(test)]
#[path = "snapshots_tests.rs"]
mod tests;
