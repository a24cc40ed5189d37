// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `latest` reference: swings on success, holds on failure; retention
//! rotation keys on the snapshot date.

use super::helpers::Fixture;
use serial_test::serial;
use tm_core::{BackupMode, Trigger};
use tm_engine::JobOptions;

fn options() -> JobOptions {
    JobOptions { mode: BackupMode::FilesOnly, rotate: false, ..JobOptions::default() }
}

#[tokio::test]
#[serial]
async fn latest_swings_only_on_successful_sync() {
    let fx = Fixture::new("").await;
    fx.install_fake_tools("exit 0", "echo 'TMDUMP NONE'; exit 0");

    // First sync succeeds: latest points at the fresh snapshot.
    let handle = fx.state.supervisor.launch("web1", options(), Trigger::Manual).unwrap();
    assert_eq!(handle.wait().await, tm_core::JobStatus::Completed);
    let host_root = fx.host_root("web1");
    let first = tm_transport::snapshots::resolve_latest(&host_root).unwrap().unwrap();

    // Second sync fails: latest must be unchanged.
    fx.install_fake_tools("exit 23", "echo 'TMDUMP NONE'; exit 0");
    let handle = fx.state.supervisor.launch("web1", options(), Trigger::Manual).unwrap();
    assert_eq!(handle.wait().await, tm_core::JobStatus::Failed);
    let after = tm_transport::snapshots::resolve_latest(&host_root).unwrap().unwrap();
    assert_eq!(after, first);
}

#[test]
fn rotation_removes_only_dates_past_the_window() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["2026-01-01", "2026-01-01_140000", "2026-01-25", "2026-02-08"] {
        std::fs::create_dir_all(dir.path().join(name).join("files")).unwrap();
    }
    let today = chrono::NaiveDate::from_ymd_opt(2026, 2, 8).unwrap();
    let removed = tm_transport::rotate::rotate(dir.path(), 14, today).unwrap();
    // Both same-day forms of 2026-01-01 rotate together; the boundary
    // snapshot survives.
    assert_eq!(removed.len(), 2);
    assert!(dir.path().join("2026-01-25").exists());
    assert!(dir.path().join("2026-02-08").exists());
    // History counts unique dates, so the two survivors are two versions.
    assert_eq!(tm_transport::snapshots::unique_date_count(dir.path()).unwrap(), 2);
}

#[tokio::test]
#[serial]
async fn db_interval_zero_is_never_scheduled() {
    let fx = Fixture::new("").await;
    fx.install_fake_tools("exit 0", "echo 'TMDUMP NONE'; exit 0");
    fx.add_host("db1 --db-interval 0h");

    let roster = tm_core::Roster::new(fx.state.settings.lock().roster_path());
    let entry = roster.find("db1").unwrap().unwrap();
    // Zero parses to "no interval", which the scheduler's gate never fires on.
    assert_eq!(entry.db_interval_hours, None);
}
