// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn temp_cursors() -> (tempfile::TempDir, Cursors) {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("state")).unwrap();
    (dir, Cursors::new(store))
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn daily_cursor_round_trips() {
    let (_dir, cursors) = temp_cursors();
    assert!(cursors.last_daily_run().unwrap().is_none());
    cursors.set_last_daily_run(date("2026-02-08")).unwrap();
    assert_eq!(cursors.last_daily_run().unwrap(), Some(date("2026-02-08")));
}

#[test]
fn corrupt_daily_cursor_reads_as_absent() {
    let (dir, cursors) = temp_cursors();
    std::fs::write(dir.path().join("state/last-daily-run"), "yesterday-ish").unwrap();
    assert!(cursors.last_daily_run().unwrap().is_none());
}

#[test]
fn db_cursor_round_trips_per_host() {
    let (_dir, cursors) = temp_cursors();
    cursors.set_last_db_run("db1", 1_700_000_000).unwrap();
    cursors.set_last_db_run("db2", 1_700_000_500).unwrap();
    assert_eq!(cursors.last_db_run("db1").unwrap(), Some(1_700_000_000));
    assert_eq!(cursors.last_db_run("db2").unwrap(), Some(1_700_000_500));
    assert!(cursors.last_db_run("db3").unwrap().is_none());
}

#[test]
fn db_cursor_is_monotonic() {
    let (_dir, cursors) = temp_cursors();
    cursors.set_last_db_run("db1", 1_700_000_500).unwrap();
    cursors.set_last_db_run("db1", 1_700_000_000).unwrap();
    assert_eq!(cursors.last_db_run("db1").unwrap(), Some(1_700_000_500));

    cursors.set_last_db_run("db1", 1_700_000_900).unwrap();
    assert_eq!(cursors.last_db_run("db1").unwrap(), Some(1_700_000_900));
}

#[test]
fn clear_removes_the_cursor() {
    let (_dir, cursors) = temp_cursors();
    cursors.set_last_db_run("db1", 1).unwrap();
    cursors.clear_last_db_run("db1").unwrap();
    assert!(cursors.last_db_run("db1").unwrap().is_none());
}
