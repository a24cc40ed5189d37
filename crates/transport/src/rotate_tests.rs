// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn mk(root: &Path, name: &str) {
    std::fs::create_dir_all(root.join(name).join("files")).unwrap();
}

#[test]
fn removes_snapshots_past_the_cutoff() {
    let dir = tempfile::tempdir().unwrap();
    mk(dir.path(), "2026-01-01");
    mk(dir.path(), "2026-01-25");
    mk(dir.path(), "2026-02-08");

    let removed = rotate(dir.path(), 14, date("2026-02-08")).unwrap();
    assert_eq!(removed, vec!["2026-01-01"]);
    assert!(!dir.path().join("2026-01-01").exists());
    assert!(dir.path().join("2026-01-25").exists());
    assert!(dir.path().join("2026-02-08").exists());
}

#[test]
fn boundary_snapshot_on_cutoff_survives() {
    let dir = tempfile::tempdir().unwrap();
    mk(dir.path(), "2026-01-25");
    // retention 14, today 02-08 -> cutoff is exactly 01-25; strictly-older only.
    let removed = rotate(dir.path(), 14, date("2026-02-08")).unwrap();
    assert!(removed.is_empty());
}

#[test]
fn same_day_timestamped_snapshots_rotate_together() {
    let dir = tempfile::tempdir().unwrap();
    mk(dir.path(), "2026-01-01");
    mk(dir.path(), "2026-01-01_140000");
    let removed = rotate(dir.path(), 7, date("2026-02-01")).unwrap();
    assert_eq!(removed.len(), 2);
}

#[test]
fn legacy_daily_dirs_rotate_too() {
    let dir = tempfile::tempdir().unwrap();
    mk(dir.path(), "daily.2025-12-01");
    mk(dir.path(), "2026-02-08");
    let removed = rotate(dir.path(), 30, date("2026-02-08")).unwrap();
    assert_eq!(removed, vec!["daily.2025-12-01"]);
}

#[test]
fn stale_links_are_cleaned() {
    let dir = tempfile::tempdir().unwrap();
    mk(dir.path(), "2026-01-01");
    crate::snapshots::swing_latest(dir.path(), &"2026-01-01".parse().unwrap()).unwrap();
    std::os::unix::fs::symlink("daily.2025-01-01", dir.path().join("daily-latest")).unwrap();

    rotate(dir.path(), 7, date("2026-02-08")).unwrap();
    // Rotation deleted the target, so both links are now stale and removed.
    assert!(dir.path().join(LATEST).symlink_metadata().is_err());
    assert!(dir.path().join("daily-latest").symlink_metadata().is_err());
}

#[test]
fn live_latest_link_survives() {
    let dir = tempfile::tempdir().unwrap();
    mk(dir.path(), "2026-02-08");
    crate::snapshots::swing_latest(dir.path(), &"2026-02-08".parse().unwrap()).unwrap();
    rotate(dir.path(), 7, date("2026-02-08")).unwrap();
    assert!(dir.path().join(LATEST).symlink_metadata().is_ok());
}

#[test]
fn unreadable_host_root_is_empty_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let removed = rotate(&dir.path().join("ghost"), 7, date("2026-02-08")).unwrap();
    assert!(removed.is_empty());
}
